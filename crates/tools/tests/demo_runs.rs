//! The example plans, run end-to-end against the real engine with delays off.

use std::sync::Arc;

use serde_json::json;

use chainrun_engine::execute_plan;
use chainrun_tools::{DelayConfig, demo_plans, demo_registry};
use chainrun_types::{Plan, Verdict};

fn plan_by_id(id: &str) -> Plan {
    demo_plans()
        .into_iter()
        .find(|plan| plan.id.as_deref() == Some(id))
        .unwrap_or_else(|| panic!("no demo plan named {id}"))
}

fn registry() -> Arc<chainrun_engine::ToolRegistry> {
    Arc::new(demo_registry(DelayConfig::disabled()))
}

#[tokio::test]
async fn diagnostic_sequence_flags_intervention_on_critical_oxygen() {
    let plan = plan_by_id("diagnostic_sequence");
    let result = execute_plan(&plan, registry()).await.unwrap();

    assert_eq!(result.verdict, Verdict::InterventionNeeded);
    assert_eq!(result.steps_completed, 3);
    assert_eq!(result.outputs["s3"]["severity"], json!("HIGH"));
    assert!(result.critical_findings.contains_key("s2"));
    assert_eq!(
        result.intervention_reason.as_deref(),
        Some("condition met: $s3.severity == 'HIGH'")
    );
}

#[tokio::test]
async fn conditional_plan_runs_the_guarded_step_when_hull_is_intact() {
    let plan = plan_by_id("conditional_plan");
    let result = execute_plan(&plan, registry()).await.unwrap();

    assert_eq!(result.verdict, Verdict::Success);
    assert_eq!(result.steps_completed, 3);
    // hull reports no breach, so the engine temperature check runs
    assert_eq!(result.outputs["s2"]["zone"], json!("engine"));
}

#[tokio::test]
async fn intervention_plan_keeps_running_after_the_flag() {
    let plan = plan_by_id("intervention_plan");
    let result = execute_plan(&plan, registry()).await.unwrap();

    assert_eq!(result.verdict, Verdict::InterventionNeeded);
    assert_eq!(result.steps_completed, 2);
    assert_eq!(result.outputs["s2"]["recommendation"], json!("EVACUATE"));
}

#[tokio::test]
async fn async_plan_mixes_dispatch_paths() {
    let plan = plan_by_id("async_plan");
    let result = execute_plan(&plan, registry()).await.unwrap();

    assert_eq!(result.verdict, Verdict::Success);
    assert_eq!(result.outputs["s1"]["life_support"], json!("DEGRADED"));
    assert_eq!(result.outputs["s2"]["status"], json!("CRITICAL_LOW"));
}

#[tokio::test]
async fn complex_plan_produces_a_critical_report() {
    let plan = plan_by_id("complex_plan");
    let result = execute_plan(&plan, registry()).await.unwrap();

    assert_eq!(result.verdict, Verdict::InterventionNeeded);
    assert_eq!(result.steps_completed, 7);
    assert_eq!(result.outputs["report"]["overall_status"], json!("CRITICAL"));
    assert_eq!(result.outputs["report"]["total_findings"], json!(1));
    let findings: Vec<&String> = result.critical_findings.keys().collect();
    assert_eq!(findings, ["hull", "oxygen", "atmosphere"]);
}
