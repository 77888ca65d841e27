//! Run the full extraction pipeline against an in-memory engine stub.
//!
//! The stub serves captures of a synthetic scene (a ring of index 2.1 around
//! a core of index 3.4) so the demo runs without a simulator installation:
//!
//! ```sh
//! RUST_LOG=debug cargo run --example extract_demo
//! ```

use std::collections::HashMap;

use anyhow::Context;
use ndarray::{Array1, Array4};
use num_complex::Complex64;

use fieldmask_core::{
    Axes, EngineError, EngineParams, EngineResult, FieldProbe, LengthUnit, ParamValue, RawCapture,
    FREE_SPACE_INDEX,
};
use fieldmask_pipeline::{
    extract_cross_section, CrossSectionRequest, PolygonStrategy, DEFAULT_REGION_TARGET,
};

const PIXEL_M: f64 = 100e-9;
const NODES: usize = 24;

/// Parameter store plus a probe serving the synthetic scene.
struct DemoSession {
    params: HashMap<(String, String), ParamValue>,
}

impl DemoSession {
    fn new() -> Self {
        let mut params = HashMap::new();
        let mut put = |parameter: &str, value: ParamValue| {
            params.insert(
                (DEFAULT_REGION_TARGET.to_string(), parameter.to_string()),
                value,
            );
        };
        put("x span", ParamValue::Float(NODES as f64 * PIXEL_M));
        put("y span", ParamValue::Float(NODES as f64 * PIXEL_M));
        put("min mesh step", ParamValue::Float(10e-9));
        put("mesh type", ParamValue::Str("auto non-uniform".into()));
        for axis in ["x", "y"] {
            put(
                &format!("define {axis} mesh by"),
                ParamValue::Str("mesh cells per wavelength".into()),
            );
            put(&format!("d{axis}"), ParamValue::Float(2.0 * PIXEL_M));
            put(&format!("allow grading in {axis}"), ParamValue::Bool(true));
        }
        put(
            "define z mesh by",
            ParamValue::Str("mesh cells per wavelength".into()),
        );
        put("mesh cells per wavelength", ParamValue::Float(6.0));
        put("allow grading in z", ParamValue::Bool(false));
        put("grading factor", ParamValue::Float(1.2));
        put("mesh refinement", ParamValue::Str("staircase".into()));
        put("meshing refinement", ParamValue::Int(1));
        Self { params }
    }
}

impl EngineParams for DemoSession {
    fn get(&mut self, target: &str, parameter: &str) -> EngineResult<ParamValue> {
        self.params
            .get(&(target.to_string(), parameter.to_string()))
            .cloned()
            .ok_or_else(|| EngineError::new(format!("no parameter '{parameter}' on '{target}'")))
    }

    fn set(&mut self, target: &str, parameter: &str, value: ParamValue) -> EngineResult<ParamValue> {
        self.params
            .insert((target.to_string(), parameter.to_string()), value.clone());
        Ok(value)
    }

    fn mesh_override_regions(&mut self) -> EngineResult<Vec<String>> {
        Ok(Vec::new())
    }
}

impl FieldProbe for DemoSession {
    fn capture_index_field(&mut self) -> EngineResult<RawCapture> {
        let center = (NODES - 1) as f64 / 2.0;
        let mut component = Array4::from_elem((NODES, NODES, 1, 1), FREE_SPACE_INDEX);
        for x in 0..NODES {
            for y in 0..NODES {
                let r = ((x as f64 - center).powi(2) + (y as f64 - center).powi(2)).sqrt();
                if r < 4.0 {
                    component[(x, y, 0, 0)] = Complex64::new(3.4, 0.0);
                } else if r < 8.0 {
                    component[(x, y, 0, 0)] = Complex64::new(2.1, 0.0);
                }
            }
        }
        let positions: Array1<f64> = (0..NODES).map(|i| i as f64 * PIXEL_M).collect();
        Ok(RawCapture {
            index_x: Some(component.clone()),
            index_y: Some(component),
            index_z: None,
            axes: Axes {
                x: positions.clone(),
                y: positions,
                z: Array1::from_vec(vec![0.0]),
            },
            frequency_points: 1,
        })
    }

    fn offset_probe(&mut self, _dx: f64, _dy: f64) -> EngineResult<()> {
        Ok(())
    }

    fn restore_probe_offset(&mut self) -> EngineResult<()> {
        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let out = std::env::temp_dir().join("fieldmask_demo");
    std::fs::create_dir_all(&out).context("creating the demo output directory")?;

    let mut session = DemoSession::new();
    let request = CrossSectionRequest::new(out.join("ring"), 100.0)
        .with_unit(LengthUnit::Nanometers)
        .with_tiling(2, 2)
        .with_polygon_strategy(PolygonStrategy::CellOutline);

    let model = extract_cross_section(&mut session, &request)
        .context("extracting the demo cross-section")?;

    println!(
        "extracted {} material(s), {} structure(s), {} layer(s)",
        model.materials.len(),
        model.structures.len(),
        model.layers.len()
    );
    println!("outputs written to {}", out.display());
    Ok(())
}
