//! CLI walkthrough of the condition marker pipeline.
//!
//! # Responsibility
//! - Drive toggle, move and flip on an in-memory scene.
//! - Print marker placements so the layout can be checked by eye.

use clap::Parser;
use condition_markers_core::db::open_db_in_memory;
use condition_markers_core::{
    core_version, default_log_level, init_logging, list_managed_markers, load_settings,
    ChangeListener, ConditionService, ImageContent, ImageGrid, ItemId, Layer, MarkerSettings,
    SceneItem, SceneStore, SqliteSceneStore, ToggleOutcome, Vector2,
};
use log::info;
use std::error::Error;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "condition-markers")]
#[command(about = "Walk through condition marker placement on an in-memory scene")]
#[command(version)]
struct Args {
    /// JSON file overriding marker settings
    #[arg(long)]
    settings: Option<PathBuf>,
    /// Directory for rolling log files (logging stays off if omitted)
    #[arg(long)]
    log_dir: Option<String>,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    if let Some(dir) = &args.log_dir {
        init_logging(default_log_level(), dir)?;
    }
    let settings = match &args.settings {
        Some(path) => load_settings(path)?,
        None => MarkerSettings::default(),
    };
    println!("condition_markers_core version={}", core_version());

    let conn = open_db_in_memory()?;
    let store = SqliteSceneStore::try_new(&conn)?;
    let token = demo_token();
    store.add_items(std::slice::from_ref(&token))?;
    let subscription = store.subscribe();

    let service = ConditionService::new(&store, settings.clone());
    for condition in ["Blinded", "Prone", "Charmed"] {
        report_toggle(condition, service.toggle_condition(&[token.id], condition)?);
    }
    print_markers("after enable", &store, token.id, &settings)?;

    let listener = ChangeListener::new(settings.clone());
    listener.drain(&store, &subscription)?;

    store.update_items(&[token.id], &mut |items: &mut [SceneItem]| {
        for item in items.iter_mut() {
            item.position = item.position + Vector2::new(60.0, 0.0);
            item.scale = Vector2::new(-1.0, 1.0);
        }
    })?;
    let handled = listener.drain(&store, &subscription)?;
    info!("event=demo_move module=cli status=ok notifications={handled}");
    print_markers("after move and flip", &store, token.id, &settings)?;

    report_toggle("Prone", service.toggle_condition(&[token.id], "Prone")?);
    print_markers("after disable", &store, token.id, &settings)?;
    Ok(())
}

fn demo_token() -> SceneItem {
    let mut item = SceneItem::new_image(
        "Goblin",
        Layer::Character,
        ImageContent {
            width: 150.0,
            height: 150.0,
            mime: "image/png".to_string(),
            url: "https://example.test/goblin.png".to_string(),
        },
        ImageGrid {
            offset: Vector2::new(75.0, 75.0),
            dpi: 150.0,
        },
    );
    item.position = Vector2::new(300.0, 300.0);
    item
}

fn report_toggle(condition: &str, outcome: ToggleOutcome) {
    match outcome {
        ToggleOutcome::Enabled(report) => {
            println!("enable {condition}: created={}", report.created)
        }
        ToggleOutcome::Disabled(report) => println!(
            "disable {condition}: deleted={} repacked={}",
            report.deleted,
            report.repack.applied.len()
        ),
    }
}

fn print_markers(
    label: &str,
    store: &SqliteSceneStore<'_>,
    token_id: ItemId,
    settings: &MarkerSettings,
) -> Result<(), Box<dyn Error>> {
    println!("{label}:");
    for marker in list_managed_markers(store, Some(token_id), settings)? {
        println!(
            "  {:<10} position=({:.1}, {:.1}) scale=({:.2}, {:.2}) rotation={:.1}",
            marker.condition.as_deref().unwrap_or("?"),
            marker.position.x,
            marker.position.y,
            marker.scale.x,
            marker.scale.y,
            marker.rotation
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::Args;
    use clap::Parser;
    use std::path::PathBuf;

    #[test]
    fn accepts_equals_and_space_forms() {
        let args =
            Args::try_parse_from(["condition-markers", "--settings=markers.json", "--log-dir", "logs"])
                .unwrap();
        assert_eq!(args.settings, Some(PathBuf::from("markers.json")));
        assert_eq!(args.log_dir.as_deref(), Some("logs"));
    }

    #[test]
    fn runs_without_arguments() {
        let args = Args::try_parse_from(["condition-markers"]).unwrap();
        assert!(args.settings.is_none());
        assert!(args.log_dir.is_none());
    }

    #[test]
    fn rejects_unknown_flags() {
        assert!(Args::try_parse_from(["condition-markers", "--verbose"]).is_err());
    }
}
