//! Reversible staging of the engine's sampling environment.
//!
//! Geometry extraction needs the engine meshed on a uniform in-plane grid
//! whose step equals the requested pixel size. [`EnvironmentStager::stage`]
//! forces that configuration and records every value it actually changes in
//! an ordered [`UndoBuffer`]; [`EnvironmentStager::restore`] replays the
//! buffer in reverse so the engine leaves the extraction exactly as it
//! entered it, on every exit path.
//!
//! The engine reports meshing modes as string tags. Those tags are parsed
//! into the closed enums below and never leak past this module.

use fieldmask_core::error::RestoreFailure;
use fieldmask_core::{EngineError, EngineParams, FieldmaskError, ParamValue, Result};

/// Engine object carrying the simulation-region and meshing parameters.
pub const DEFAULT_REGION_TARGET: &str = "simulation_region";

/// Target in-plane minimum mesh step: 0.25 nm, in meters.
const MIN_MESH_STEP: f64 = 0.25e-9;

/// Mesh cells per wavelength for the (unconstrained) z mesh.
const MESH_CELLS_PER_WAVELENGTH: f64 = 10.0;

/// Mesh grading factor, the engine's √2 convention.
const GRADING_FACTOR: f64 = 1.41421;

/// Refinement level used with the precise-volume-average algorithm.
const MESH_REFINEMENT_LEVEL: i64 = 5;

/// The engine's mesh-generation modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MeshType {
    AutoNonUniform,
    CustomNonUniform,
    Uniform,
}

impl MeshType {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "auto non-uniform" => Some(Self::AutoNonUniform),
            "custom non-uniform" => Some(Self::CustomNonUniform),
            "uniform" => Some(Self::Uniform),
            _ => None,
        }
    }

    fn tag(self) -> &'static str {
        match self {
            Self::AutoNonUniform => "auto non-uniform",
            Self::CustomNonUniform => "custom non-uniform",
            Self::Uniform => "uniform",
        }
    }
}

/// How one axis of the mesh is defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MeshDefinition {
    MaximumMeshStep,
    CellsPerWavelength,
    NumberOfMeshCells,
}

impl MeshDefinition {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "maximum mesh step" => Some(Self::MaximumMeshStep),
            "mesh cells per wavelength" => Some(Self::CellsPerWavelength),
            "number of mesh cells" => Some(Self::NumberOfMeshCells),
            _ => None,
        }
    }

    fn tag(self) -> &'static str {
        match self {
            Self::MaximumMeshStep => "maximum mesh step",
            Self::CellsPerWavelength => "mesh cells per wavelength",
            Self::NumberOfMeshCells => "number of mesh cells",
        }
    }
}

/// The engine's mesh-refinement algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MeshRefinement {
    Staircase,
    ConformalVariant0,
    ConformalVariant1,
    DielectricVolumeAverage,
    VolumeAverage,
    PreciseVolumeAverage,
}

impl MeshRefinement {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "staircase" => Some(Self::Staircase),
            "conformal variant 0" => Some(Self::ConformalVariant0),
            "conformal variant 1" => Some(Self::ConformalVariant1),
            "dielectric volume average" => Some(Self::DielectricVolumeAverage),
            "volume average" => Some(Self::VolumeAverage),
            "precise volume average" => Some(Self::PreciseVolumeAverage),
            _ => None,
        }
    }

    fn tag(self) -> &'static str {
        match self {
            Self::Staircase => "staircase",
            Self::ConformalVariant0 => "conformal variant 0",
            Self::ConformalVariant1 => "conformal variant 1",
            Self::DielectricVolumeAverage => "dielectric volume average",
            Self::VolumeAverage => "volume average",
            Self::PreciseVolumeAverage => "precise volume average",
        }
    }
}

/// One staged change: the value `parameter` on `target` held before staging.
#[derive(Debug, Clone)]
pub struct UndoEntry {
    /// Engine object the parameter belongs to.
    pub target: String,
    /// Parameter name.
    pub parameter: String,
    /// The pre-staging value to write back.
    pub value: ParamValue,
}

/// Ordered log of the staged changes, oldest first.
///
/// Restoring replays the entries in reverse of the order values were
/// recorded, so the last staged change is undone first.
#[derive(Debug, Default)]
pub struct UndoBuffer {
    entries: Vec<UndoEntry>,
}

impl UndoBuffer {
    /// Create an empty buffer.
    #[must_use = "the buffer is created but not used"]
    pub fn new() -> Self {
        Self::default()
    }

    /// True when staging changed nothing.
    #[inline]
    #[must_use = "the emptiness check is returned, not stored"]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of staged changes.
    #[inline]
    #[must_use = "the length is returned, not stored"]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// The staged changes in recording order.
    #[must_use = "the entries are returned, not stored"]
    pub fn entries(&self) -> &[UndoEntry] {
        &self.entries
    }

    fn record(&mut self, target: &str, parameter: &str, value: ParamValue) {
        self.entries.push(UndoEntry {
            target: target.to_string(),
            parameter: parameter.to_string(),
            value,
        });
    }
}

/// Stages deterministic sampling conditions on the engine and restores the
/// prior configuration afterwards.
///
/// This is a scoped-resource pattern over a remote, stateful engine:
/// acquisition is [`stage`](Self::stage), guaranteed release is
/// [`restore`](Self::restore), regardless of the outcome of the work done in
/// between. `restore` must run exactly once per `stage`.
#[derive(Debug, Clone)]
pub struct EnvironmentStager {
    region: String,
}

impl Default for EnvironmentStager {
    fn default() -> Self {
        Self::new(DEFAULT_REGION_TARGET)
    }
}

impl EnvironmentStager {
    /// Create a stager addressing the given simulation-region object.
    #[must_use = "the stager is created but not used"]
    pub fn new(region_target: impl Into<String>) -> Self {
        Self {
            region: region_target.into(),
        }
    }

    /// Force the engine into the extraction configuration for `pixel_size`
    /// (meters), buffering every value that actually had to change.
    ///
    /// Staged, in order: region spans snapped to the nearest pixel multiple,
    /// active mesh-override regions disabled, minimum mesh step, mesh type,
    /// in-plane mesh definition/step/grading per axis, z mesh definition and
    /// grading, and the mesh-refinement algorithm and level. Parameters
    /// already holding the required value are not touched and not recorded.
    ///
    /// # Errors
    ///
    /// [`FieldmaskError::Staging`] when a parameter cannot be read or
    /// written; whatever was buffered up to that point is restored first. If
    /// that restore fails too, both failures are carried in
    /// [`FieldmaskError::WorkAndRestore`].
    pub fn stage<E: EngineParams>(&self, engine: &mut E, pixel_size: f64) -> Result<UndoBuffer> {
        let mut buffer = UndoBuffer::new();
        log::debug!(
            "staging '{}' for geometry extraction at pixel size {pixel_size} m",
            self.region
        );
        match self.stage_inner(engine, pixel_size, &mut buffer) {
            Ok(()) => {
                log::debug!("staged {} parameter(s)", buffer.len());
                Ok(buffer)
            }
            Err(staging) => match self.restore(engine, buffer) {
                Ok(()) => Err(staging),
                Err(restore) => Err(FieldmaskError::WorkAndRestore {
                    work: Box::new(staging),
                    restore: Box::new(restore),
                }),
            },
        }
    }

    /// Write every buffered value back, last staged change first.
    ///
    /// All entries are attempted even when some fail.
    ///
    /// # Errors
    ///
    /// [`FieldmaskError::Restore`] listing each parameter that could not be
    /// written back.
    pub fn restore<E: EngineParams>(&self, engine: &mut E, buffer: UndoBuffer) -> Result<()> {
        let mut failures = Vec::new();
        for entry in buffer.entries.into_iter().rev() {
            if let Err(source) = engine.set(&entry.target, &entry.parameter, entry.value.clone()) {
                failures.push(RestoreFailure {
                    target: entry.target,
                    parameter: entry.parameter,
                    source,
                });
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(FieldmaskError::Restore { failures })
        }
    }

    fn stage_inner<E: EngineParams>(
        &self,
        engine: &mut E,
        pixel_size: f64,
        buffer: &mut UndoBuffer,
    ) -> Result<()> {
        let region = self.region.clone();

        // Region spans must tile into whole pixels.
        for parameter in ["x span", "y span"] {
            let span = read_float(engine, &region, parameter)?;
            if !is_pixel_multiple(span, pixel_size) {
                let snapped = (span / pixel_size).round() * pixel_size;
                set_staged(engine, buffer, &region, parameter, ParamValue::Float(span), ParamValue::Float(snapped))?;
            }
        }

        // Mesh-override regions would defeat the uniform grid.
        let overrides = engine
            .mesh_override_regions()
            .map_err(|source| staging_error(&region, "mesh override regions", source))?;
        for name in overrides {
            let enabled = read_bool(engine, &name, "enabled")?;
            if enabled {
                set_staged(engine, buffer, &name, "enabled", ParamValue::Bool(true), ParamValue::Bool(false))?;
            }
        }

        let min_step = read_float(engine, &region, "min mesh step")?;
        if min_step != MIN_MESH_STEP {
            set_staged(engine, buffer, &region, "min mesh step", ParamValue::Float(min_step), ParamValue::Float(MIN_MESH_STEP))?;
        }

        let mesh_type_tag = read_str(engine, &region, "mesh type")?;
        let mesh_type = MeshType::from_tag(&mesh_type_tag)
            .ok_or_else(|| unknown_tag_error(&region, "mesh type", &mesh_type_tag))?;
        if mesh_type != MeshType::CustomNonUniform {
            set_staged(
                engine,
                buffer,
                &region,
                "mesh type",
                ParamValue::Str(mesh_type_tag),
                ParamValue::Str(MeshType::CustomNonUniform.tag().to_string()),
            )?;
        }

        // In-plane meshes: fixed maximum step of one pixel, no grading.
        for axis in ["x", "y"] {
            let definition_param = format!("define {axis} mesh by");
            let definition_tag = read_str(engine, &region, &definition_param)?;
            let definition = MeshDefinition::from_tag(&definition_tag)
                .ok_or_else(|| unknown_tag_error(&region, &definition_param, &definition_tag))?;
            if definition != MeshDefinition::MaximumMeshStep {
                set_staged(
                    engine,
                    buffer,
                    &region,
                    &definition_param,
                    ParamValue::Str(definition_tag),
                    ParamValue::Str(MeshDefinition::MaximumMeshStep.tag().to_string()),
                )?;
            }

            let step_param = format!("d{axis}");
            let max_step = read_float(engine, &region, &step_param)?;
            if max_step != pixel_size {
                set_staged(engine, buffer, &region, &step_param, ParamValue::Float(max_step), ParamValue::Float(pixel_size))?;
            }

            let grading_param = format!("allow grading in {axis}");
            let grading = read_bool(engine, &region, &grading_param)?;
            if grading {
                set_staged(engine, buffer, &region, &grading_param, ParamValue::Bool(true), ParamValue::Bool(false))?;
            }
        }

        // The z mesh stays wavelength-driven and graded.
        let z_definition_tag = read_str(engine, &region, "define z mesh by")?;
        let z_definition = MeshDefinition::from_tag(&z_definition_tag)
            .ok_or_else(|| unknown_tag_error(&region, "define z mesh by", &z_definition_tag))?;
        if z_definition != MeshDefinition::CellsPerWavelength {
            set_staged(
                engine,
                buffer,
                &region,
                "define z mesh by",
                ParamValue::Str(z_definition_tag),
                ParamValue::Str(MeshDefinition::CellsPerWavelength.tag().to_string()),
            )?;
        }

        let cells = read_float(engine, &region, "mesh cells per wavelength")?;
        if cells != MESH_CELLS_PER_WAVELENGTH {
            set_staged(
                engine,
                buffer,
                &region,
                "mesh cells per wavelength",
                ParamValue::Float(cells),
                ParamValue::Float(MESH_CELLS_PER_WAVELENGTH),
            )?;
        }

        let z_grading = read_bool(engine, &region, "allow grading in z")?;
        if !z_grading {
            set_staged(engine, buffer, &region, "allow grading in z", ParamValue::Bool(false), ParamValue::Bool(true))?;
        }

        let grading_factor = read_float(engine, &region, "grading factor")?;
        if grading_factor != GRADING_FACTOR {
            set_staged(
                engine,
                buffer,
                &region,
                "grading factor",
                ParamValue::Float(grading_factor),
                ParamValue::Float(GRADING_FACTOR),
            )?;
        }

        let refinement_tag = read_str(engine, &region, "mesh refinement")?;
        let refinement = MeshRefinement::from_tag(&refinement_tag)
            .ok_or_else(|| unknown_tag_error(&region, "mesh refinement", &refinement_tag))?;
        if refinement != MeshRefinement::PreciseVolumeAverage {
            set_staged(
                engine,
                buffer,
                &region,
                "mesh refinement",
                ParamValue::Str(refinement_tag),
                ParamValue::Str(MeshRefinement::PreciseVolumeAverage.tag().to_string()),
            )?;
        }

        let level = read_int(engine, &region, "meshing refinement")?;
        if level != MESH_REFINEMENT_LEVEL {
            set_staged(
                engine,
                buffer,
                &region,
                "meshing refinement",
                ParamValue::Int(level),
                ParamValue::Int(MESH_REFINEMENT_LEVEL),
            )?;
        }

        Ok(())
    }
}

/// Whether `span` already tiles into whole pixels.
#[inline]
fn is_pixel_multiple(span: f64, pixel_size: f64) -> bool {
    let ratio = span / pixel_size;
    (ratio - ratio.round()).abs() < 1e-9
}

fn staging_error(target: &str, parameter: &str, source: EngineError) -> FieldmaskError {
    FieldmaskError::Staging {
        target: target.to_string(),
        parameter: parameter.to_string(),
        source,
    }
}

fn unknown_tag_error(target: &str, parameter: &str, tag: &str) -> FieldmaskError {
    staging_error(
        target,
        parameter,
        EngineError::new(format!("engine reported unknown tag '{tag}'")),
    )
}

fn read(engine: &mut impl EngineParams, target: &str, parameter: &str) -> Result<ParamValue> {
    engine
        .get(target, parameter)
        .map_err(|source| staging_error(target, parameter, source))
}

fn read_float(engine: &mut impl EngineParams, target: &str, parameter: &str) -> Result<f64> {
    read(engine, target, parameter)?.as_float().ok_or_else(|| {
        staging_error(target, parameter, EngineError::new("expected a float parameter"))
    })
}

fn read_int(engine: &mut impl EngineParams, target: &str, parameter: &str) -> Result<i64> {
    read(engine, target, parameter)?.as_int().ok_or_else(|| {
        staging_error(target, parameter, EngineError::new("expected an integer parameter"))
    })
}

fn read_bool(engine: &mut impl EngineParams, target: &str, parameter: &str) -> Result<bool> {
    read(engine, target, parameter)?.as_bool().ok_or_else(|| {
        staging_error(target, parameter, EngineError::new("expected a boolean parameter"))
    })
}

fn read_str(engine: &mut impl EngineParams, target: &str, parameter: &str) -> Result<String> {
    match read(engine, target, parameter)? {
        ParamValue::Str(tag) => Ok(tag),
        _ => Err(staging_error(
            target,
            parameter,
            EngineError::new("expected a string parameter"),
        )),
    }
}

/// Write the new value, then record the old one for undo. A rejected write
/// is never buffered, so restore only touches parameters that actually
/// changed. The engine is authoritative: an accepted value differing from
/// the requested one is a warning, not an error.
fn set_staged(
    engine: &mut impl EngineParams,
    buffer: &mut UndoBuffer,
    target: &str,
    parameter: &str,
    old: ParamValue,
    new: ParamValue,
) -> Result<()> {
    log::debug!("staging '{parameter}' on '{target}' to {new}");
    let accepted = engine
        .set(target, parameter, new.clone())
        .map_err(|source| staging_error(target, parameter, source))?;
    if accepted != new {
        log::warn!(
            "engine accepted {accepted} instead of {new} for '{parameter}' on '{target}'"
        );
    }
    buffer.record(target, parameter, old);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldmask_core::EngineResult;
    use std::collections::HashMap;

    /// Parameter store that logs every write and can fail on demand.
    struct ScriptedEngine {
        params: HashMap<(String, String), ParamValue>,
        overrides: Vec<String>,
        writes: Vec<(String, String, ParamValue)>,
        fail_set_on: Option<String>,
    }

    impl ScriptedEngine {
        fn staged_ready(pixel_size: f64) -> Self {
            let mut params = HashMap::new();
            let mut put = |target: &str, parameter: &str, value: ParamValue| {
                params.insert((target.to_string(), parameter.to_string()), value);
            };
            let region = DEFAULT_REGION_TARGET;
            put(region, "x span", ParamValue::Float(8.0 * pixel_size));
            put(region, "y span", ParamValue::Float(8.0 * pixel_size));
            put(region, "min mesh step", ParamValue::Float(MIN_MESH_STEP));
            put(region, "mesh type", ParamValue::Str("custom non-uniform".into()));
            for axis in ["x", "y"] {
                put(region, &format!("define {axis} mesh by"), ParamValue::Str("maximum mesh step".into()));
                put(region, &format!("d{axis}"), ParamValue::Float(pixel_size));
                put(region, &format!("allow grading in {axis}"), ParamValue::Bool(false));
            }
            put(region, "define z mesh by", ParamValue::Str("mesh cells per wavelength".into()));
            put(region, "mesh cells per wavelength", ParamValue::Float(MESH_CELLS_PER_WAVELENGTH));
            put(region, "allow grading in z", ParamValue::Bool(true));
            put(region, "grading factor", ParamValue::Float(GRADING_FACTOR));
            put(region, "mesh refinement", ParamValue::Str("precise volume average".into()));
            put(region, "meshing refinement", ParamValue::Int(MESH_REFINEMENT_LEVEL));
            Self {
                params,
                overrides: Vec::new(),
                writes: Vec::new(),
                fail_set_on: None,
            }
        }

        fn unstaged(pixel_size: f64) -> Self {
            let mut engine = Self::staged_ready(pixel_size);
            let mut put = |target: &str, parameter: &str, value: ParamValue| {
                engine
                    .params
                    .insert((target.to_string(), parameter.to_string()), value);
            };
            let region = DEFAULT_REGION_TARGET;
            put(region, "x span", ParamValue::Float(8.5 * pixel_size));
            put(region, "mesh type", ParamValue::Str("auto non-uniform".into()));
            put(region, "allow grading in x", ParamValue::Bool(true));
            put(region, "mesh refinement", ParamValue::Str("staircase".into()));
            put("override_1", "enabled", ParamValue::Bool(true));
            engine.overrides.push("override_1".into());
            engine
        }
    }

    impl EngineParams for ScriptedEngine {
        fn get(&mut self, target: &str, parameter: &str) -> EngineResult<ParamValue> {
            self.params
                .get(&(target.to_string(), parameter.to_string()))
                .cloned()
                .ok_or_else(|| EngineError::new(format!("no parameter '{parameter}' on '{target}'")))
        }

        fn set(
            &mut self,
            target: &str,
            parameter: &str,
            value: ParamValue,
        ) -> EngineResult<ParamValue> {
            if self.fail_set_on.as_deref() == Some(parameter) {
                return Err(EngineError::new("write rejected"));
            }
            self.params
                .insert((target.to_string(), parameter.to_string()), value.clone());
            self.writes
                .push((target.to_string(), parameter.to_string(), value.clone()));
            Ok(value)
        }

        fn mesh_override_regions(&mut self) -> EngineResult<Vec<String>> {
            Ok(self.overrides.clone())
        }
    }

    const PIXEL: f64 = 100e-9;

    #[test]
    fn staging_a_matching_engine_is_a_no_op() {
        let mut engine = ScriptedEngine::staged_ready(PIXEL);
        let stager = EnvironmentStager::default();
        let buffer = stager.stage(&mut engine, PIXEL).unwrap();
        assert!(buffer.is_empty());
        assert!(engine.writes.is_empty());

        // Restoring an empty buffer writes nothing either.
        stager.restore(&mut engine, buffer).unwrap();
        assert!(engine.writes.is_empty());
    }

    #[test]
    fn staging_records_only_changed_values() {
        let mut engine = ScriptedEngine::unstaged(PIXEL);
        let stager = EnvironmentStager::default();
        let buffer = stager.stage(&mut engine, PIXEL).unwrap();

        let staged: Vec<&str> = buffer.entries().iter().map(|e| e.parameter.as_str()).collect();
        assert_eq!(
            staged,
            vec![
                "x span",
                "enabled",
                "mesh type",
                "allow grading in x",
                "mesh refinement"
            ]
        );
        // The span snaps to the nearest pixel multiple.
        let snapped = engine
            .get(DEFAULT_REGION_TARGET, "x span")
            .unwrap()
            .as_float()
            .unwrap();
        assert!((snapped / PIXEL - (snapped / PIXEL).round()).abs() < 1e-9);
    }

    #[test]
    fn restore_replays_in_reverse_order() {
        let mut engine = ScriptedEngine::unstaged(PIXEL);
        let stager = EnvironmentStager::default();
        let buffer = stager.stage(&mut engine, PIXEL).unwrap();
        let staged_order: Vec<String> =
            buffer.entries().iter().map(|e| e.parameter.clone()).collect();

        engine.writes.clear();
        stager.restore(&mut engine, buffer).unwrap();
        let restored_order: Vec<String> =
            engine.writes.iter().map(|(_, p, _)| p.clone()).collect();
        let mut expected = staged_order;
        expected.reverse();
        assert_eq!(restored_order, expected);

        // The engine is back in its original configuration.
        assert_eq!(
            engine.get(DEFAULT_REGION_TARGET, "mesh type").unwrap(),
            ParamValue::Str("auto non-uniform".into())
        );
        assert_eq!(
            engine.get("override_1", "enabled").unwrap(),
            ParamValue::Bool(true)
        );
    }

    #[test]
    fn failed_staging_restores_what_was_buffered() {
        let mut engine = ScriptedEngine::unstaged(PIXEL);
        engine.fail_set_on = Some("mesh refinement".into());
        let stager = EnvironmentStager::default();

        let err = stager.stage(&mut engine, PIXEL).unwrap_err();
        assert!(matches!(err, FieldmaskError::Staging { ref parameter, .. } if parameter == "mesh refinement"));

        // Everything staged before the failure is back to its prior value.
        assert_eq!(
            engine.get(DEFAULT_REGION_TARGET, "mesh type").unwrap(),
            ParamValue::Str("auto non-uniform".into())
        );
        assert_eq!(
            engine.get(DEFAULT_REGION_TARGET, "allow grading in x").unwrap(),
            ParamValue::Bool(true)
        );
    }

    #[test]
    fn unknown_mesh_type_tag_is_a_staging_error() {
        let mut engine = ScriptedEngine::staged_ready(PIXEL);
        engine.params.insert(
            (DEFAULT_REGION_TARGET.to_string(), "mesh type".to_string()),
            ParamValue::Str("tetrahedral".into()),
        );
        let stager = EnvironmentStager::default();
        let err = stager.stage(&mut engine, PIXEL).unwrap_err();
        assert!(matches!(err, FieldmaskError::Staging { ref parameter, .. } if parameter == "mesh type"));
    }

    #[test]
    fn restore_attempts_every_entry_and_reports_failures() {
        let mut engine = ScriptedEngine::unstaged(PIXEL);
        let stager = EnvironmentStager::default();
        let buffer = stager.stage(&mut engine, PIXEL).unwrap();

        engine.fail_set_on = Some("mesh type".into());
        engine.writes.clear();
        let err = stager.restore(&mut engine, buffer).unwrap_err();
        match err {
            FieldmaskError::Restore { failures } => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].parameter, "mesh type");
            }
            other => panic!("expected a restore error, got {other:?}"),
        }
        // The failing entry did not stop the rest from being written back.
        assert!(engine.writes.iter().any(|(_, p, _)| p == "x span"));
        assert!(engine.writes.iter().any(|(_, p, _)| p == "enabled"));
    }
}
