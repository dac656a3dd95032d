//! Overall status summary command.

use serde_json::json;

use crate::state::AppState;

/// `onramp status`
pub async fn status(state: &AppState, json_output: bool) -> anyhow::Result<()> {
    let employees = state.employee_service.list().await?;

    let total = employees.len();
    let completed = employees
        .iter()
        .filter(|e| e.onboarding.completed_at.is_some())
        .count();
    let in_flight = employees
        .iter()
        .filter(|e| e.workflow_token.is_some() && e.onboarding.completed_at.is_none())
        .count();
    let not_started = total - completed - in_flight;

    if json_output {
        let value = json!({
            "total_employees": total,
            "completed": completed,
            "in_flight": in_flight,
            "not_started": not_started,
            "database": state.data_dir.join("onramp.db").display().to_string(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!();
    println!("  {} Onboarding status", console::style("⚙").bold());
    println!();
    println!("  Employees:    {total}");
    println!("  Completed:    {}", console::style(completed).green());
    println!("  In flight:    {}", console::style(in_flight).yellow());
    println!("  Not started:  {}", console::style(not_started).dim());
    println!();
    println!(
        "  Database: {}",
        console::style(state.data_dir.join("onramp.db").display()).dim()
    );
    println!();
    Ok(())
}
