use std::sync::Arc;

use async_trait::async_trait;

use ztpflow_actions::{ActionExecutor, ActionOutcome, ActionParams};
use ztpflow_core::*;
use ztpflow_inventory::{HostGroupResolver, Inventory};

const WORKFLOW: &str = include_str!("../../../demos/workflow.toml");
const INVENTORY: &str = include_str!("../../../demos/inventory.toml");

/// Accepts exactly the actions declared in the workflow
struct DeclaredActions(Workflow);

#[async_trait]
impl ActionExecutor for DeclaredActions {
    async fn invoke(
        &self,
        _action: &str,
        _host: Option<&str>,
        _params: &ActionParams,
    ) -> ActionOutcome {
        ActionOutcome::succeeded(vec![])
    }

    fn supports(&self, action: &str) -> bool {
        self.0.actions.contains_key(action)
    }
}

#[test]
fn test_demo_workflow_validates() {
    let workflow = Workflow::from_toml_str(WORKFLOW).unwrap();
    workflow.validate().unwrap();

    let ids: Vec<&str> = workflow.stages.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(
        ids,
        vec!["initial-setup", "l2-setup", "l3-setup", "vrrp-setup", "ebgp-setup"]
    );
    assert_eq!(workflow.group_names().unwrap(), vec!["all", "spine", "leaf"]);
}

#[test]
fn test_demo_inventory_covers_workflow_groups() {
    let workflow = Workflow::from_toml_str(WORKFLOW).unwrap();
    let inventory = Inventory::from_toml_str(INVENTORY).unwrap();

    for group in workflow.group_names().unwrap() {
        assert!(inventory.resolve(&group).is_some(), "group {group} missing");
    }
}

#[tokio::test]
async fn test_demo_plan() {
    let workflow = Workflow::from_toml_str(WORKFLOW).unwrap();
    let inventory = Arc::new(Inventory::from_toml_str(INVENTORY).unwrap());
    let orchestrator = Orchestrator::new(
        Arc::new(DeclaredActions(workflow.clone())),
        inventory,
        EngineConfig::default(),
    );

    let plan = orchestrator.plan(&workflow.stages).unwrap();

    assert_eq!(plan[0].hosts.len(), 4);
    assert_eq!(plan[0].max_attempts, 3);
    assert_eq!(plan[1].hosts, vec!["auto-spine1"]);
    assert_eq!(plan[1].cardinality, Cardinality::Group);
    assert_eq!(plan[3].hosts, vec!["auto-leaf1", "auto-leaf2"]);
    assert_eq!(plan[4].max_attempts, 1);

    let report = orchestrator.run(&workflow.stages).await.unwrap();
    assert_eq!(report.verdict(), Verdict::Success);
    assert_eq!(report.stages.len(), 5);
}
