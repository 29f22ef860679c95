use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use crop_core::controls::ModelControls;
use crop_core::io::report::{AggregateReport, CellRecord};
use crop_core::io::scenario::ScenarioFile;
use crop_core::mgmt::MgmtComponent;
use crop_core::model::SensitivityAdjustment;
use crop_core::{run_scenario, RunOptions, ScenarioRun};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "cropstep",
    about = "Batch runner for crop scenarios, writing NDJSON reports"
)]
struct Args {
    /// Path to the scenario JSON document.
    #[arg(long = "scenario-file", value_name = "PATH")]
    scenario_file: PathBuf,

    /// Output NDJSON file for the aggregate report.
    #[arg(long)]
    out: PathBuf,

    /// Optional path to emit one NDJSON record per computed cell.
    #[arg(long = "emit-cells", value_name = "PATH")]
    emit_cells: Option<PathBuf>,

    /// Crop to model instead of the document's active crop.
    #[arg(long, value_name = "NAME")]
    crop: Option<String>,

    /// Precipitation change in percent.
    #[arg(long = "precip-change", value_name = "PERCENT", allow_negative_numbers = true)]
    precip_change: Option<f64>,

    /// Temperature change in °C.
    #[arg(long = "temp-change", value_name = "DEGREES", allow_negative_numbers = true)]
    temp_change: Option<f64>,

    /// Nitrogen override in kg/ha.
    #[arg(long, value_name = "KG_HA")]
    nitrogen: Option<f64>,

    /// Phosphorus (P2O5) override in kg/ha.
    #[arg(long, value_name = "KG_HA")]
    phosphorus: Option<f64>,

    /// Potassium (K2O) override in kg/ha.
    #[arg(long, value_name = "KG_HA")]
    potassium: Option<f64>,

    /// Irrigation override as the irrigated fraction of area.
    #[arg(long, value_name = "FRACTION")]
    irrigation: Option<f64>,

    /// Drop every management override the document carries.
    #[arg(
        long = "clear-overrides",
        conflicts_with_all = ["nitrogen", "phosphorus", "potassium", "irrigation"]
    )]
    clear_overrides: bool,

    /// Run the nutrient sensitivity model instead of the full scenario model.
    #[arg(long)]
    sensitivity: bool,

    /// Nitrogen change in percent for `--sensitivity`.
    #[arg(
        long = "n-change",
        value_name = "PERCENT",
        requires = "sensitivity",
        allow_negative_numbers = true
    )]
    n_change: Option<f64>,

    /// Phosphorus change in percent for `--sensitivity`.
    #[arg(
        long = "p-change",
        value_name = "PERCENT",
        requires = "sensitivity",
        allow_negative_numbers = true
    )]
    p_change: Option<f64>,

    /// Potassium change in percent for `--sensitivity`.
    #[arg(
        long = "k-change",
        value_name = "PERCENT",
        requires = "sensitivity",
        allow_negative_numbers = true
    )]
    k_change: Option<f64>,

    /// Aggregate cells across all cores.
    #[arg(long)]
    parallel: bool,
}

impl Args {
    fn controls(&self, scenario: &ScenarioFile) -> ModelControls {
        let mut controls = scenario.model_controls();
        if let Some(crop) = &self.crop {
            if *crop != controls.crop {
                controls.crop = crop.clone();
                controls.clear_overrides();
            }
        }
        if let Some(change) = self.precip_change {
            controls.precip_change = change;
        }
        if let Some(change) = self.temp_change {
            controls.temp_change = change;
        }
        if self.clear_overrides {
            controls.clear_overrides();
        }
        let overrides = [
            (MgmtComponent::Nitrogen, self.nitrogen),
            (MgmtComponent::Phosphorus, self.phosphorus),
            (MgmtComponent::Potassium, self.potassium),
            (MgmtComponent::Irrigation, self.irrigation),
        ];
        for (component, value) in overrides {
            if value.is_some() {
                controls.mgmt_overrides.set(component, value);
            }
        }
        controls
    }

    fn sensitivity(&self) -> Option<SensitivityAdjustment> {
        let fraction = |percent: Option<f64>| percent.unwrap_or(0.0) / 100.0;
        self.sensitivity.then(|| SensitivityAdjustment {
            nitrogen: fraction(self.n_change),
            phosphorus: fraction(self.p_change),
            potassium: fraction(self.k_change),
        })
    }

    fn run_options(&self, scenario: &ScenarioFile) -> RunOptions {
        RunOptions {
            controls: Some(self.controls(scenario)),
            sensitivity: self.sensitivity(),
            parallel: self.parallel,
        }
    }
}

fn write_report<W: Write>(
    writer: &mut W,
    scenario: &ScenarioFile,
    run: &ScenarioRun,
) -> Result<()> {
    let report = AggregateReport::new(&scenario.name, &run.controls.crop, &run.aggregate);
    writer.write_all(report.to_ndjson()?.as_bytes())?;
    Ok(())
}

fn write_cells<W: Write>(writer: &mut W, run: &ScenarioRun) -> Result<()> {
    for cell in &run.cells {
        let line = CellRecord::from(cell).to_ndjson()?;
        writer.write_all(line.as_bytes())?;
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let args = Args::parse();

    let scenario = ScenarioFile::load_from_path(&args.scenario_file)
        .with_context(|| format!("failed to read scenario {:?}", args.scenario_file))?;
    let run = run_scenario(&scenario, &args.run_options(&scenario))?;

    let report_file =
        File::create(&args.out).with_context(|| format!("failed to create {:?}", args.out))?;
    let mut report_writer = BufWriter::new(report_file);
    write_report(&mut report_writer, &scenario, &run)?;
    report_writer.flush()?;

    if let Some(path) = &args.emit_cells {
        let file = File::create(path)
            .with_context(|| format!("failed to create cell file at {:?}", path))?;
        let mut writer = BufWriter::new(file);
        write_cells(&mut writer, &run)?;
        writer.flush()?;
    }

    info!(
        scenario = %scenario.name,
        crop = %run.controls.crop,
        cells = run.cells.len(),
        "wrote scenario report"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use clap::CommandFactory;
    use std::path::Path;

    fn fixture() -> ScenarioFile {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../testdata/scenarios/maize_small.json");
        ScenarioFile::load_from_path(&path).expect("fixture loads")
    }

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["cropstep", "--scenario-file", "s.json", "--out", "out.ndjson"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).expect("arguments parse")
    }

    #[test]
    fn requires_scenario_file() {
        let err = Args::try_parse_from(["cropstep", "--out", "out.ndjson"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn rejects_overrides_with_clear_overrides() {
        let err = Args::try_parse_from([
            "cropstep",
            "--scenario-file",
            "s.json",
            "--out",
            "out.ndjson",
            "--clear-overrides",
            "--nitrogen",
            "120",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn nutrient_changes_need_sensitivity_flag() {
        let err = Args::try_parse_from([
            "cropstep",
            "--scenario-file",
            "s.json",
            "--out",
            "out.ndjson",
            "--n-change",
            "10",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn flags_override_document_controls() {
        let scenario = fixture();
        let args = parse(&["--precip-change", "-10", "--nitrogen", "140"]);
        let controls = args.controls(&scenario);
        assert_eq!(controls.crop, "maize");
        assert_eq!(controls.precip_change, -10.0);
        assert_eq!(controls.temp_change, 2.0);
        assert_eq!(controls.mgmt_overrides.nitrogen(), Some(140.0));
        assert_eq!(controls.mgmt_overrides.phosphorus(), None);
    }

    #[test]
    fn command_line_overrides_survive_crop_change() {
        let scenario = fixture();
        let args = parse(&["--nitrogen", "140", "--crop", "rice"]);
        let controls = args.controls(&scenario);
        assert_eq!(controls.crop, "rice");
        assert_eq!(controls.mgmt_overrides.nitrogen(), Some(140.0));
    }

    #[test]
    fn sensitivity_changes_are_fractions() {
        let args = parse(&["--sensitivity", "--n-change", "50", "--k-change", "-20"]);
        let adjustment = args.sensitivity().expect("sensitivity enabled");
        assert_eq!(adjustment.nitrogen, 0.5);
        assert_eq!(adjustment.phosphorus, 0.0);
        assert_eq!(adjustment.potassium, -0.2);
        assert!(parse(&[]).sensitivity().is_none());
    }

    #[test]
    fn paired_runs_are_deterministic() {
        let scenario = fixture();
        let args = parse(&[]);
        let run_once = || {
            let run = run_scenario(&scenario, &args.run_options(&scenario)).expect("run succeeds");
            let mut buffer = Vec::new();
            write_report(&mut buffer, &scenario, &run).expect("report writes");
            write_cells(&mut buffer, &run).expect("cells write");
            String::from_utf8(buffer).expect("utf8 output")
        };

        let first = run_once();
        let second = run_once();
        assert_eq!(first, second);
        assert_eq!(first.lines().count(), 1 + scenario.cell_locations().len());
        assert!(first.starts_with(r#"{"type":"aggregate","scenario":"maize_small""#));
    }

    #[test]
    fn irrigation_is_a_fraction_of_area() {
        let command = Args::command();
        let irrigation = command
            .get_arguments()
            .find(|arg| arg.get_id() == "irrigation")
            .expect("irrigation flag exists");
        let help = irrigation.get_help().map(ToString::to_string).unwrap_or_default();
        assert!(help.contains("fraction of area"));

        let controls = parse(&["--irrigation", "0.4"]).controls(&fixture());
        assert_eq!(controls.mgmt_overrides.irrigation(), Some(0.4));
    }
}
