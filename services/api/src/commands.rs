use crate::infra::ConfiguredNotifier;
use apprenticeship::config::AppConfig;
use apprenticeship::error::AppError;
use apprenticeship::notify::{ConfirmationTemplate, Notifier};
use apprenticeship::registry::{ApprenticeshipFlag, ChannelId, RegistrySeed, UserRole};
use apprenticeship::telemetry;
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub(crate) struct SeedCheckArgs {
    /// Path to a JSON seed file with users, curators, curator groups, and types
    pub(crate) path: PathBuf,
}

#[derive(Args, Debug)]
pub(crate) struct NotifyArgs {
    /// Recipient channel id (Telegram chat id)
    pub(crate) channel_id: String,
    /// Message text; defaults to the attendance confirmation message
    #[arg(long)]
    pub(crate) text: Option<String>,
}

pub(crate) fn run_seed_check(args: SeedCheckArgs) -> Result<(), AppError> {
    let seed = RegistrySeed::from_path(&args.path)?;
    println!("{}", render_seed_summary(&seed));
    Ok(())
}

fn render_seed_summary(seed: &RegistrySeed) -> String {
    let students = seed
        .users
        .iter()
        .filter(|user| user.role == UserRole::Student)
        .count();

    let mut lines = vec![
        "Seed file is valid".to_string(),
        format!(
            "- users: {} ({} students, {} staff)",
            seed.users.len(),
            students,
            seed.users.len() - students
        ),
        format!("- curators: {}", seed.curators.len()),
        format!("- curator groups: {}", seed.curator_groups.len()),
        format!("- apprenticeship types: {}", seed.apprenticeship_types.len()),
    ];
    for kind in &seed.apprenticeship_types {
        lines.push(format!("  * {} ({})", kind.name, kind.id));
    }
    lines.join("\n")
}

pub(crate) async fn run_notify(args: NotifyArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let text = args.text.unwrap_or_else(|| {
        ConfirmationTemplate::new(config.registry.report_portal_url.clone())
            .render(ApprenticeshipFlag::Attendance)
    });
    let notifier = ConfiguredNotifier::from_config(&config.telegram)?;
    notifier
        .send(&ChannelId(args.channel_id.clone()), &text)
        .await?;

    println!("Message sent to {}", args.channel_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_students_and_types() {
        let seed = RegistrySeed::from_json(
            r#"{
                "users": [
                    { "id": "u-1", "channel_id": "1", "name": "Anna", "role": "student" },
                    { "id": "u-2", "channel_id": "2", "name": "Office", "role": "administrator" }
                ],
                "apprenticeship_types": [ { "id": "t-1", "name": "Production practice" } ]
            }"#,
        )
        .expect("seed parses");

        let summary = render_seed_summary(&seed);
        assert!(summary.contains("users: 2 (1 students, 1 staff)"));
        assert!(summary.contains("* Production practice (t-1)"));
    }
}
