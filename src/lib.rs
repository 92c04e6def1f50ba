//! Line-of-sight visibility engine for a virtual tabletop.
//!
//! Computes visibility polygons around viewers, wall/door blocking, token
//! visibility and cover, and swept-circle movement clamping. With the
//! `python` feature the JSON bridge in [`api`] is exposed as a Python
//! extension module.

pub mod api;
pub mod collision;
pub mod controller;
pub mod error;
pub mod fog;
pub mod geometry;
pub mod segments;
pub mod sight;
pub mod terrain;
pub mod types;
pub mod units;
pub mod visibility;
pub mod walls;

#[cfg(feature = "python")]
mod python {
    use pyo3::prelude::*;

    use crate::api;
    use crate::error::EngineError;

    fn to_py_err(err: EngineError) -> PyErr {
        PyErr::new::<pyo3::exceptions::PyValueError, _>(err.to_string())
    }

    /// Visibility polygon for one token on a map.
    #[pyfunction]
    fn vision_json(request_json: &str) -> PyResult<String> {
        api::vision_json(request_json).map_err(to_py_err)
    }

    /// How much of a target token an observer can see.
    #[pyfunction]
    fn visibility_json(request_json: &str) -> PyResult<String> {
        api::visibility_json(request_json).map_err(to_py_err)
    }

    #[pyfunction]
    fn cover_json(request_json: &str) -> PyResult<String> {
        api::cover_json(request_json).map_err(to_py_err)
    }

    /// Clamp a token drag against walls.
    #[pyfunction]
    fn clamp_movement_json(request_json: &str) -> PyResult<String> {
        api::clamp_movement_json(request_json).map_err(to_py_err)
    }

    #[pyfunction]
    fn door_update_json(request_json: &str) -> PyResult<String> {
        api::door_update_json(request_json).map_err(to_py_err)
    }

    /// Vision engine, importable from Python.
    #[pymodule]
    fn vision_rs(m: &Bound<'_, PyModule>) -> PyResult<()> {
        m.add_function(wrap_pyfunction!(vision_json, m)?)?;
        m.add_function(wrap_pyfunction!(visibility_json, m)?)?;
        m.add_function(wrap_pyfunction!(cover_json, m)?)?;
        m.add_function(wrap_pyfunction!(clamp_movement_json, m)?)?;
        m.add_function(wrap_pyfunction!(door_update_json, m)?)?;
        Ok(())
    }
}
