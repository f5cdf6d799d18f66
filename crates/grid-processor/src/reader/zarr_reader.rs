//! Reader for Zarr arrays written by [`ZarrWriter`](crate::writer::ZarrWriter).

use std::path::Path;
use std::sync::Arc;

use flood_common::RasterGrid;
use zarrs::array::{Array, DataType};
use zarrs_filesystem::FilesystemStore;

use super::RasterReader;
use crate::error::{GridProcessorError, Result};
use crate::types::RasterTile;
use crate::writer::RasterAttributes;

/// Reads 2-D float32/float64 Zarr arrays with georeferencing attributes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZarrReader;

impl ZarrReader {
    fn open(path: &Path) -> Result<Array<FilesystemStore>> {
        if !path.is_dir() {
            return Err(GridProcessorError::open_failed(format!(
                "{}: not a Zarr directory",
                path.display()
            )));
        }
        let store = FilesystemStore::new(path)
            .map_err(|e| GridProcessorError::open_failed(format!("{}: {}", path.display(), e)))?;
        Array::open(Arc::new(store), "/")
            .map_err(|e| GridProcessorError::open_failed(format!("{}: {}", path.display(), e)))
    }

    fn grid_of(array: &Array<FilesystemStore>) -> Result<(RasterGrid, RasterAttributes)> {
        let shape = array.shape();
        if shape.len() != 2 {
            return Err(GridProcessorError::invalid_metadata(format!(
                "expected a 2-D array, got {} dimensions",
                shape.len()
            )));
        }

        let attributes = RasterAttributes::from_map(array.attributes())?;
        let grid = RasterGrid::new(
            attributes.crs,
            attributes.transform()?,
            shape[1] as usize,
            shape[0] as usize,
        )?;
        Ok((grid, attributes))
    }
}

impl RasterReader for ZarrReader {
    fn read_grid(&self, path: &Path) -> Result<RasterGrid> {
        let array = Self::open(path)?;
        Ok(Self::grid_of(&array)?.0)
    }

    fn read_tile(&self, path: &Path) -> Result<RasterTile> {
        let array = Self::open(path)?;
        let (grid, attributes) = Self::grid_of(&array)?;
        let subset = array.subset_all();

        let data: Vec<f32> = match array.data_type() {
            DataType::Float32 => array
                .retrieve_array_subset_elements::<f32>(&subset)
                .map_err(|e| GridProcessorError::read_failed(e.to_string()))?,
            DataType::Float64 => array
                .retrieve_array_subset_elements::<f64>(&subset)
                .map_err(|e| GridProcessorError::read_failed(e.to_string()))?
                .into_iter()
                .map(|v| v as f32)
                .collect(),
            other => {
                return Err(GridProcessorError::UnsupportedFormat(format!(
                    "{}: data type {:?}",
                    path.display(),
                    other
                )))
            }
        };

        RasterTile::new(grid, data, attributes.nodata.map(|v| v as f32))
    }
}
