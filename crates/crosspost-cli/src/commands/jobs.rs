//! Job commands.

use anyhow::Result;
use serde_json::{Value, json};

use crate::commands::Client;

fn field<'a>(job: &'a Value, name: &str) -> &'a str {
    job.get(name).and_then(|v| v.as_str()).unwrap_or("-")
}

pub async fn list(
    client: &Client,
    status: &str,
    platform: &str,
    from: Option<String>,
    to: Option<String>,
) -> Result<()> {
    let mut query = vec![
        ("status", status.to_string()),
        ("platform", platform.to_string()),
    ];
    if let Some(from) = from {
        query.push(("from", from));
    }
    if let Some(to) = to {
        query.push(("to", to));
    }

    let jobs = client.get("/api/v1/jobs", &query).await?;
    let jobs = jobs.as_array().cloned().unwrap_or_default();
    if jobs.is_empty() {
        println!("No jobs found");
        return Ok(());
    }

    println!(
        "{:<38} {:<10} {:<11} {:<25} ERROR",
        "ID", "PLATFORM", "STATUS", "SCHEDULED"
    );
    for job in &jobs {
        println!(
            "{:<38} {:<10} {:<11} {:<25} {}",
            field(job, "id"),
            field(job, "platform"),
            field(job, "status"),
            field(job, "scheduled_time"),
            field(job, "error_log"),
        );
    }
    Ok(())
}

pub async fn retry(client: &Client, id: &str) -> Result<()> {
    let job = client.post(&format!("/api/v1/jobs/{id}/retry"), None).await?;
    print_outcome(&job);
    Ok(())
}

pub async fn bulk_retry(client: &Client, ids: &[String]) -> Result<()> {
    let report = client
        .post("/api/v1/jobs/retry", Some(json!({ "ids": ids })))
        .await?;
    let retried = report.get("retried").and_then(|v| v.as_u64()).unwrap_or(0);
    println!("Retried {retried} of {} jobs", ids.len());
    Ok(())
}

pub async fn publish(client: &Client, id: &str) -> Result<()> {
    let job = client
        .post(&format!("/api/v1/jobs/{id}/publish"), None)
        .await?;
    print_outcome(&job);
    Ok(())
}

pub async fn cancel(client: &Client, id: &str) -> Result<()> {
    let job = client
        .post(&format!("/api/v1/jobs/{id}/cancel"), None)
        .await?;
    println!("Job {} is now {}", field(&job, "id"), field(&job, "status"));
    Ok(())
}

fn print_outcome(job: &Value) {
    let status = field(job, "status");
    match status {
        "published" => println!(
            "Job {} published (platform id {})",
            field(job, "id"),
            field(job, "external_id")
        ),
        "failed" => println!(
            "Job {} failed: {}",
            field(job, "id"),
            field(job, "error_log")
        ),
        other => println!("Job {} is now {}", field(job, "id"), other),
    }
}
