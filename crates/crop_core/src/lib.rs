pub mod aggregate;
pub mod catalog;
pub mod controls;
pub mod datum;
pub mod error;
pub mod io;
pub mod layers;
pub mod mgmt;
pub mod model;
pub mod nullable;
pub mod tables;
pub mod yield_model;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use aggregate::ScenarioAggregate;
use controls::{ModelControls, ModelState};
use datum::ScenarioDatum;
use io::scenario::ScenarioFile;
use model::{CropModel, SensitivityAdjustment};

/// How a scenario document is run.
#[derive(Clone, Debug, Default)]
pub struct RunOptions {
    /// Controls to use instead of the document's own.
    pub controls: Option<ModelControls>,
    /// Run the fast nutrient sensitivity path instead of the full model.
    pub sensitivity: Option<SensitivityAdjustment>,
    /// Aggregate across the rayon thread pool.
    pub parallel: bool,
}

/// Every computed cell of a run and their aggregate.
#[derive(Clone, Debug)]
pub struct ScenarioRun {
    pub controls: ModelControls,
    pub state: ModelState,
    pub cells: Vec<ScenarioDatum>,
    pub aggregate: ScenarioAggregate,
}

/// Compute every location of `scenario` and aggregate the results.
///
/// Controls outside the range of the climate data are logged and still run;
/// an unknown crop, a bad coefficient table or a NaN yield delta fail the run.
pub fn run_scenario(scenario: &ScenarioFile, options: &RunOptions) -> Result<ScenarioRun> {
    let controls = options
        .controls
        .clone()
        .unwrap_or_else(|| scenario.model_controls());
    let mut model = CropModel::new(scenario.model_tables()?, scenario.layers(), controls)
        .with_context(|| format!("cannot model scenario {:?}", scenario.name))?;
    if let Err(err) = model.check_scenario_sanity(model.controls()) {
        warn!(scenario = %scenario.name, %err, "scenario outside the modeled range");
    }

    let locations = scenario.cell_locations();
    let mut cells = Vec::with_capacity(locations.len());
    for location in locations {
        let cell = match options.sensitivity {
            Some(adjustment) => model.compute_scenario_datum_simplified(location, adjustment),
            None => model.compute_scenario_datum(location),
        }
        .with_context(|| format!("failed to compute cell at {}", location))?;
        cells.push(cell);
    }

    let state = model.state();
    let aggregate = if options.parallel {
        ScenarioAggregate::par_from_data(&cells, &state)
    } else {
        ScenarioAggregate::from_data(&cells, &state)
    }
    .context("scenario aggregation failed")?;
    debug!(
        scenario = %scenario.name,
        cells = cells.len(),
        incomplete = aggregate.incomplete_data_count(),
        "scenario run complete"
    );

    Ok(ScenarioRun {
        controls: model.controls().clone(),
        state,
        cells,
        aggregate,
    })
}
