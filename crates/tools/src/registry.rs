//! The mock diagnostic tool suite.

use async_trait::async_trait;
use serde_json::{Map as JsonMap, Value, json};

use chainrun_engine::{Tool, ToolRegistry};

use crate::delay::DelayConfig;

/// Builds a registry with the full diagnostic suite.
///
/// All tools except `scan_systems` are blocking; `scan_systems` suspends so
/// the suite covers both dispatch paths.
pub fn demo_registry(delay: DelayConfig) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register_blocking("scan_hull", move |_| Ok(scan_hull(&delay)));
    registry.register_blocking("check_oxygen", move |_| Ok(check_oxygen(&delay)));
    registry.register_blocking("analyze_atmosphere", move |args| {
        Ok(analyze_atmosphere(&delay, &args))
    });
    registry.register_blocking("check_temperature", move |args| {
        Ok(check_temperature(&delay, &args))
    });
    registry.register_blocking("generate_report", move |args| {
        Ok(generate_report(&delay, &args))
    });
    registry.register("scan_systems", SystemScan { delay });

    registry.annotate("scan_hull", "Scan the hull for structural integrity and breaches");
    registry.annotate("check_oxygen", "Check atmospheric oxygen levels");
    registry.annotate(
        "analyze_atmosphere",
        "Analyze atmosphere and recommend action based on oxygen level",
    );
    registry.annotate("check_temperature", "Check temperature in a specific zone");
    registry.annotate("generate_report", "Generate a summary report from collected findings");
    registry.annotate("scan_systems", "Comprehensive scan of all major systems");

    registry
}

fn scan_hull(delay: &DelayConfig) -> Value {
    let slept = delay.simulate_work("hull_scan");
    json!({
        "integrity": 98,
        "integrity_percent": "98%",
        "breach_detected": false,
        "execution_delay_ms": slept.as_millis() as u64,
    })
}

fn check_oxygen(delay: &DelayConfig) -> Value {
    let slept = delay.simulate_work("oxygen_check");
    json!({
        "level": 14.5,
        "unit": "percent",
        "status": "CRITICAL_LOW",
        "threshold": 18.0,
        "execution_delay_ms": slept.as_millis() as u64,
    })
}

fn analyze_atmosphere(delay: &DelayConfig, args: &JsonMap<String, Value>) -> Value {
    let slept = delay.simulate_work("atmosphere_analysis");
    let delay_ms = slept.as_millis() as u64;

    let Some(o2_level) = args.get("o2_level").and_then(Value::as_f64) else {
        return json!({
            "recommendation": "ERROR",
            "severity": "UNKNOWN",
            "reason": "No oxygen level provided",
            "execution_delay_ms": delay_ms,
        });
    };

    if o2_level < 15.0 {
        json!({
            "recommendation": "EVACUATE",
            "severity": "HIGH",
            "reason": format!("Oxygen level {o2_level}% is below safe threshold (15%)"),
            "execution_delay_ms": delay_ms,
        })
    } else if o2_level < 18.0 {
        json!({
            "recommendation": "ALERT",
            "severity": "MEDIUM",
            "reason": format!("Oxygen level {o2_level}% is below optimal (18%)"),
            "execution_delay_ms": delay_ms,
        })
    } else {
        json!({
            "recommendation": "MONITOR",
            "severity": "LOW",
            "reason": format!("Oxygen level {o2_level}% is within acceptable range"),
            "execution_delay_ms": delay_ms,
        })
    }
}

fn check_temperature(delay: &DelayConfig, args: &JsonMap<String, Value>) -> Value {
    let slept = delay.simulate_work("temperature_check");
    let zone = args.get("zone").and_then(Value::as_str).unwrap_or("main");
    let temperature = match zone {
        "main" => 22.5,
        "engine" => 45.0,
        "cargo" => 18.0,
        _ => 20.0,
    };
    let status = if temperature > 15.0 && temperature < 35.0 {
        "NORMAL"
    } else {
        "WARNING"
    };
    json!({
        "zone": zone,
        "temperature": temperature,
        "unit": "celsius",
        "status": status,
        "execution_delay_ms": slept.as_millis() as u64,
    })
}

fn generate_report(delay: &DelayConfig, args: &JsonMap<String, Value>) -> Value {
    let slept = delay.simulate_work("report_generation");

    let mut high = 0u64;
    let mut medium = 0u64;
    let mut low = 0u64;
    if let Some(Value::Object(findings)) = args.get("findings") {
        for finding in findings.values() {
            match finding.get("severity").and_then(Value::as_str) {
                Some("HIGH") => high += 1,
                Some("MEDIUM") => medium += 1,
                Some("LOW") => low += 1,
                _ => {}
            }
        }
    }

    let overall = if high > 0 {
        "CRITICAL"
    } else if medium > 0 {
        "WARNING"
    } else {
        "OK"
    };

    json!({
        "overall_status": overall,
        "severity_counts": {"HIGH": high, "MEDIUM": medium, "LOW": low},
        "total_findings": high + medium + low,
        "execution_delay_ms": slept.as_millis() as u64,
    })
}

struct SystemScan {
    delay: DelayConfig,
}

#[async_trait]
impl Tool for SystemScan {
    async fn invoke(&self, _args: JsonMap<String, Value>) -> anyhow::Result<Value> {
        let slept = self.delay.simulate_work_async("systems_scan").await;
        Ok(json!({
            "power": "NOMINAL",
            "navigation": "ONLINE",
            "life_support": "DEGRADED",
            "communications": "ONLINE",
            "execution_delay_ms": slept.as_millis() as u64,
        }))
    }
}
