//! One-shot admin console: loads a plan's matrix through the server, stages
//! the requested edits in a [`StagingSession`] and saves them as one batch.

use std::fmt::Write as _;

use anyhow::Context;
use cardmatrix_core::{OptionCategory, Resolution, StagingSession};

use crate::client::{ConsoleError, MatrixClient};
use crate::ConsoleArgs;

pub(crate) async fn run_console(args: &ConsoleArgs) -> anyhow::Result<()> {
    let client = MatrixClient::new(&args.server, args.api_key.clone(), args.timeout_secs)?;

    let plan_name = match client.list_plans().await {
        Ok(plans) => plans
            .into_iter()
            .find(|p| p.id == args.plan_id)
            .map(|p| p.name),
        Err(e) => {
            tracing::warn!(error = %e, "could not list plans");
            None
        }
    };

    let mut session = StagingSession::new();
    session
        .load(&client, args.plan_id, args.material.as_deref())
        .await
        .with_context(|| format!("failed to load plan {}", args.plan_id))?;

    stage_edits(&mut session, args)?;
    print!("{}", render_matrix(&session, plan_name.as_deref()));

    let pending = session.pending_count();
    if pending == 0 {
        println!("no staged changes");
        return Ok(());
    }
    if args.dry_run {
        println!("{pending} staged change(s) not saved (dry run)");
        return Ok(());
    }

    let report = session.save_all(&client).await?;
    println!(
        "saved {} of {} change(s)",
        report.updated_count, report.requested
    );
    for failed in &report.failed {
        println!(
            "  failed option {}{}: {}",
            failed.option_id,
            failed
                .material_key
                .as_deref()
                .map(|m| format!(" under {m}"))
                .unwrap_or_default(),
            failed.reason
        );
    }
    if !report.failed.is_empty() {
        anyhow::bail!(
            "{} change(s) failed; {} remain staged",
            report.failed.len(),
            session.pending_count()
        );
    }
    Ok(())
}

fn stage_edits(session: &mut StagingSession, args: &ConsoleArgs) -> anyhow::Result<()> {
    let resolution = session
        .resolution()
        .context("matrix not loaded")?
        .clone();

    for selector in &args.enable {
        let id = find_option(&resolution, selector)?;
        session.set::<ConsoleError>(id, true)?;
    }
    for selector in &args.disable {
        let id = find_option(&resolution, selector)?;
        session.set::<ConsoleError>(id, false)?;
    }
    for selector in &args.toggle {
        let id = find_option(&resolution, selector)?;
        session.toggle::<ConsoleError>(id)?;
    }
    Ok(())
}

/// Resolves an option id, a bare key, or `category:key` to an option id.
pub(crate) fn find_option(resolution: &Resolution, selector: &str) -> anyhow::Result<i64> {
    let selector = selector.trim();
    if let Ok(id) = selector.parse::<i64>() {
        return resolution
            .option(id)
            .map(|r| r.option.id)
            .with_context(|| format!("option {id} is not in the catalog"));
    }

    let (category, key) = match selector.split_once(':') {
        Some((category, key)) => (Some(category.parse::<OptionCategory>()?), key),
        None => (None, selector),
    };

    let matches: Vec<_> = resolution
        .options
        .iter()
        .filter(|r| r.option.key == key && category.is_none_or(|c| c == r.option.category))
        .collect();

    match matches.as_slice() {
        [single] => Ok(single.option.id),
        [] => anyhow::bail!("no option with key '{key}'"),
        _ => anyhow::bail!("key '{key}' is ambiguous; use category:key"),
    }
}

pub(crate) fn render_matrix(session: &StagingSession, plan_name: Option<&str>) -> String {
    let mut out = String::new();
    let Some(resolution) = session.resolution() else {
        return out;
    };
    let material = session.material_key();

    let _ = writeln!(
        out,
        "plan {} ({})  material: {}",
        resolution.plan_id.map_or_else(|| "-".to_owned(), |id| id.to_string()),
        plan_name.unwrap_or("unknown"),
        material.unwrap_or("any")
    );
    let _ = writeln!(
        out,
        "{:<10}{:<6}{:<16}{:<20}{:<7}PRICE",
        "CATEGORY", "ID", "KEY", "LABEL", "STATE"
    );

    for resolved in &resolution.options {
        let option = &resolved.option;
        if let Some(material) = material {
            if option.category.is_material_scoped() && !option.applies_to(material) {
                continue;
            }
        }

        let shown = session.plan_enabled(option.id).unwrap_or(resolved.plan_enabled);
        let state = match (shown, shown != resolved.plan_enabled) {
            (true, false) => "on",
            (false, false) => "off",
            (true, true) => "on*",
            (false, true) => "off*",
        };
        let price = resolved
            .effective_price
            .map(|p| p.to_string())
            .unwrap_or_default();

        let _ = writeln!(
            out,
            "{:<10}{:<6}{:<16}{:<20}{:<7}{}",
            option.category.as_str(),
            option.id,
            option.key,
            option.label,
            state,
            price
        );
    }

    let _ = writeln!(out, "{} staged change(s)", session.pending_count());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardmatrix_core::{
        resolve_for_plan, BatchOutcome, CardOption, MatrixBackend, OverrideToggle, PlanOverride,
    };
    use rust_decimal::Decimal;

    #[derive(Debug, thiserror::Error)]
    #[error("unused")]
    struct Unused;

    struct Fixed(Resolution);

    impl MatrixBackend for Fixed {
        type Error = Unused;

        async fn resolve(&self, _: i64, _: Option<&str>) -> Result<Resolution, Unused> {
            Ok(self.0.clone())
        }

        async fn batch_upsert(
            &self,
            _: i64,
            _: &[OverrideToggle],
        ) -> Result<BatchOutcome, Unused> {
            Ok(BatchOutcome::default())
        }
    }

    fn option(id: i64, category: OptionCategory, key: &str, applies: &[&str]) -> CardOption {
        CardOption {
            id,
            category,
            key: key.to_owned(),
            label: key.to_uppercase(),
            description: None,
            price: (category == OptionCategory::Material).then(|| Decimal::from(10)),
            applicable_material_keys: applies.iter().map(|s| (*s).to_owned()).collect(),
            globally_enabled: true,
            founders_only: false,
            display_order: i32::try_from(id).unwrap_or_default(),
        }
    }

    fn resolution() -> Resolution {
        let options = vec![
            option(1, OptionCategory::Material, "metal", &[]),
            option(2, OptionCategory::Material, "wood", &[]),
            option(3, OptionCategory::Colour, "gold", &["metal"]),
            option(4, OptionCategory::Texture, "gold", &["metal"]),
            option(5, OptionCategory::Colour, "walnut", &["wood"]),
        ];
        let overrides = vec![PlanOverride {
            plan_id: 7,
            option_id: 3,
            material_scope: Some("metal".to_owned()),
            enabled: true,
            price_override: None,
        }];
        resolve_for_plan(&options, &overrides, 7, Some("metal"))
    }

    #[test]
    fn find_option_accepts_ids_and_keys() {
        let resolution = resolution();
        assert_eq!(find_option(&resolution, "2").expect("id"), 2);
        assert_eq!(find_option(&resolution, "walnut").expect("key"), 5);
        assert_eq!(find_option(&resolution, "texture:gold").expect("qualified"), 4);
    }

    #[test]
    fn find_option_rejects_ambiguous_and_unknown() {
        let resolution = resolution();
        assert!(find_option(&resolution, "gold").is_err());
        assert!(find_option(&resolution, "platinum").is_err());
        assert!(find_option(&resolution, "99").is_err());
        assert!(find_option(&resolution, "finish:gold").is_err());
    }

    #[tokio::test]
    async fn render_marks_staged_edits_and_hides_other_materials() {
        let backend = Fixed(resolution());
        let mut session = StagingSession::new();
        session
            .load(&backend, 7, Some("metal"))
            .await
            .expect("load");
        session.set::<Unused>(1, true).expect("stage metal");

        let text = render_matrix(&session, Some("Pro"));
        assert!(text.starts_with("plan 7 (Pro)  material: metal"));
        let metal = text
            .lines()
            .find(|l| l.starts_with("material") && l.contains("metal"))
            .expect("metal row");
        assert!(metal.contains("on*"));
        let gold = text.lines().find(|l| l.starts_with("colour")).expect("gold row");
        assert!(gold.contains(" on "));
        assert!(!text.contains("walnut"));
        assert!(text.ends_with("1 staged change(s)\n"));
    }
}
