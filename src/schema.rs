use schemars::schema_for;
use serde_json::json;

use crate::api::types::{PlanRequest, PlanResponse};
use crate::model::PlanState;

/// Print the JSON Schemas for the request/response surface and the internal
/// pipeline state.
pub fn run() -> anyhow::Result<()> {
    let schemas = json!({
        "plan_request": schema_for!(PlanRequest),
        "plan_response": schema_for!(PlanResponse),
        "plan_state": schema_for!(PlanState),
    });
    println!("{}", serde_json::to_string_pretty(&schemas)?);
    Ok(())
}
