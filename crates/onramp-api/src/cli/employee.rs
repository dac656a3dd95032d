//! Employee CLI commands.

use comfy_table::Table;
use serde_json::json;
use uuid::Uuid;

use onramp_types::employee::Employee;
use onramp_types::onboarding::{OnboardingStatusView, StepStatus};

use crate::state::AppState;

/// `onramp list employees`
pub async fn list_employees(state: &AppState, json_output: bool) -> anyhow::Result<()> {
    let employees = state.employee_service.list().await?;

    if json_output {
        let values: Vec<serde_json::Value> = employees
            .iter()
            .map(|e| {
                let mut value = serde_json::to_value(e).unwrap_or_default();
                value["progress"] = json!(e.onboarding.progress());
                value
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&values)?);
        return Ok(());
    }

    if employees.is_empty() {
        println!();
        println!("  No employees yet.");
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec![
        "Name",
        "Email",
        "Department",
        "Start Date",
        "Progress",
        "Status",
    ]);
    for employee in &employees {
        table.add_row(vec![
            employee.name.clone(),
            employee.email.clone(),
            employee.department.clone(),
            employee.start_date.to_string(),
            format!("{:.0}%", employee.onboarding.progress()),
            lifecycle_label(employee).to_string(),
        ]);
    }
    println!("{table}");
    Ok(())
}

/// `onramp show <id>`
pub async fn show_employee(state: &AppState, id: &str, json_output: bool) -> anyhow::Result<()> {
    let id: Uuid = id
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid employee id '{id}'"))?;
    let employee = state.employee_service.get(&id).await?;
    let view = OnboardingStatusView::from(&employee.onboarding);

    if json_output {
        let mut value = serde_json::to_value(&employee)?;
        value["onboarding_view"] = serde_json::to_value(&view)?;
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} ({} · {})",
        console::style(&employee.name).cyan().bold(),
        employee.role,
        employee.department
    );
    println!("  {} · starts {}", employee.email, employee.start_date);
    println!(
        "  Progress: {}",
        console::style(format!("{:.0}%", view.progress)).bold()
    );
    println!();
    for entry in &view.steps {
        println!("  {} {}", status_mark(entry.status), entry.step);
    }
    println!();
    if !employee.quiz_attempts.is_empty() {
        println!("  Quiz attempts:");
        for attempt in &employee.quiz_attempts {
            let verdict = if attempt.passed {
                console::style("passed").green()
            } else {
                console::style("failed").red()
            };
            println!(
                "    {} quiz: {} ({} points)",
                attempt.quiz, verdict, attempt.score
            );
        }
        println!();
    }
    Ok(())
}

fn lifecycle_label(employee: &Employee) -> &'static str {
    if employee.onboarding.completed_at.is_some() {
        "completed"
    } else if employee.onboarding.started_at.is_some() {
        "in progress"
    } else {
        "not started"
    }
}

fn status_mark(status: StepStatus) -> String {
    match status {
        StepStatus::Completed => format!("{}", console::style("✓").green()),
        StepStatus::Waiting => format!("{}", console::style("⧖").yellow()),
        StepStatus::InProgress | StepStatus::Retry => format!("{}", console::style("…").yellow()),
        StepStatus::Failed => format!("{}", console::style("✗").red()),
        StepStatus::NotStarted => format!("{}", console::style("·").dim()),
    }
}
