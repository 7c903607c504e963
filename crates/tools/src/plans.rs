//! Example plans exercising the diagnostic suite.

use serde_json::json;

use chainrun_types::{Plan, Step};

fn plan(id: &str, name: &str, description: &str, steps: Vec<Step>) -> Plan {
    Plan {
        id: Some(id.to_string()),
        name: Some(name.to_string()),
        description: Some(description.to_string()),
        steps,
    }
}

fn diagnostic_sequence() -> Plan {
    plan(
        "diagnostic_sequence",
        "Diagnostic Sequence",
        "Standard diagnostic sequence for system health check",
        vec![
            Step::new("s1", "scan_hull").with_description("External hull integrity scan"),
            Step::new("s2", "check_oxygen")
                .with_description("Life support oxygen check")
                .key_finding(),
            Step::new("s3", "analyze_atmosphere")
                .with_description("Analyze atmosphere based on oxygen level")
                .with_args([("o2_level", json!("$s2.level"))])
                .with_intervention_if("$s3.severity == 'HIGH'"),
        ],
    )
}

fn conditional_plan() -> Plan {
    plan(
        "conditional_plan",
        "Conditional Execution",
        "Plan with conditional step execution",
        vec![
            Step::new("s1", "scan_hull").with_description("Initial hull scan"),
            Step::new("s2", "check_temperature")
                .with_description("Check engine temperature (only if hull OK)")
                .with_args([("zone", json!("engine"))])
                .with_run_if("$s1.breach_detected == False"),
            Step::new("s3", "check_oxygen")
                .with_description("Check oxygen levels")
                .key_finding(),
        ],
    )
}

fn intervention_plan() -> Plan {
    plan(
        "intervention_plan",
        "Intervention Test",
        "Plan that triggers human intervention",
        vec![
            Step::new("s1", "check_oxygen")
                .with_description("Check oxygen (will be critical)")
                .key_finding()
                .with_intervention_if("$s1.level < 15"),
            Step::new("s2", "analyze_atmosphere")
                .with_description("Analyze (runs even after intervention flag)")
                .with_args([("o2_level", json!("$s1.level"))]),
        ],
    )
}

fn async_plan() -> Plan {
    plan(
        "async_plan",
        "Suspending Tools Test",
        "Plan mixing suspending and blocking tools",
        vec![
            Step::new("s1", "scan_systems").with_description("Suspending system scan"),
            Step::new("s2", "check_oxygen").with_description("Blocking oxygen check"),
        ],
    )
}

fn complex_plan() -> Plan {
    plan(
        "complex_plan",
        "Full System Diagnostic",
        "Comprehensive system diagnostic with report",
        vec![
            Step::new("hull", "scan_hull")
                .with_description("Hull integrity scan")
                .key_finding(),
            Step::new("oxygen", "check_oxygen")
                .with_description("Oxygen level check")
                .key_finding(),
            Step::new("temp_main", "check_temperature")
                .with_description("Main area temperature")
                .with_args([("zone", json!("main"))]),
            Step::new("temp_engine", "check_temperature")
                .with_description("Engine temperature")
                .with_args([("zone", json!("engine"))])
                .with_run_if("$hull.breach_detected == False"),
            Step::new("atmosphere", "analyze_atmosphere")
                .with_description("Atmosphere analysis")
                .with_args([("o2_level", json!("$oxygen.level"))])
                .key_finding()
                .with_intervention_if("$atmosphere.severity == 'HIGH'"),
            Step::new("systems", "scan_systems").with_description("Full systems scan"),
            Step::new("report", "generate_report")
                .with_description("Generate summary report")
                .with_args([(
                    "findings",
                    json!({
                        "hull": "$hull",
                        "oxygen": "$oxygen",
                        "atmosphere": "$atmosphere",
                    }),
                )]),
        ],
    )
}

/// All example plans, in presentation order.
pub fn demo_plans() -> Vec<Plan> {
    vec![
        diagnostic_sequence(),
        conditional_plan(),
        intervention_plan(),
        async_plan(),
        complex_plan(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_demo_plan_validates() {
        for plan in demo_plans() {
            plan.validate()
                .unwrap_or_else(|err| panic!("{}: {err}", plan.display_id()));
        }
    }

    #[test]
    fn demo_plans_only_name_registered_tools() {
        let registry = crate::demo_registry(crate::DelayConfig::disabled());
        for plan in demo_plans() {
            for step in &plan.steps {
                assert!(
                    registry.contains(&step.tool),
                    "{} names unknown tool {}",
                    plan.display_id(),
                    step.tool
                );
            }
        }
    }
}
