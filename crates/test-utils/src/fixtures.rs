//! Common test fixtures for flood depth tests.
//!
//! This module provides pre-defined tile names, grid layouts and a writer
//! for small synthetic GeoTIFF tiles.

use std::fs::File;
use std::path::Path;

use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

/// Default tile prefix of the JRC flood depth products.
pub const TILE_PREFIX: &str = "WD_MERGE";

/// No-data sentinel used by the synthetic tiles.
pub const NODATA: f32 = -9999.0;

/// Builds a tile file name in the JRC layout:
/// `<prefix>_<start>---<end>_duration_<days>d_<tile>.tif`.
///
/// Dates are passed through verbatim so malformed names can be built too.
pub fn tile_name(start: &str, end: &str, tile: &str) -> String {
    format!("{TILE_PREFIX}_{start}---{end}_duration_1d_{tile}.tif")
}

/// Common grid layouts for testing.
pub mod grid {
    /// Equi7Grid Europe tile origin used in fixtures (meters).
    pub const EQUI7_ORIGIN: (f64, f64) = (5_400_000.0, 1_500_000.0);

    /// Small geographic patch over the Po valley (degrees).
    pub const PO_VALLEY_ORIGIN: (f64, f64) = (10.0, 45.5);
}

/// GeoTIFF layout description for [`write_geotiff`].
#[derive(Debug, Clone, Copy)]
pub struct GeoTiffFixture {
    pub width: u32,
    pub height: u32,
    /// World coordinates of the top-left corner.
    pub origin: (f64, f64),
    /// Square pixel size in CRS units.
    pub pixel_size: f64,
    /// EPSG code written to the GeoKey directory; `None` writes no CRS.
    pub epsg: Option<u16>,
    pub nodata: Option<f32>,
}

impl GeoTiffFixture {
    /// A projected tile on the Equi7 Europe grid with the default sentinel.
    pub fn equi7(width: u32, height: u32, pixel_size: f64) -> Self {
        Self {
            width,
            height,
            origin: grid::EQUI7_ORIGIN,
            pixel_size,
            epsg: Some(27704),
            nodata: Some(NODATA),
        }
    }

    /// A WGS84 tile with the default sentinel.
    pub fn wgs84(width: u32, height: u32, origin: (f64, f64), pixel_size: f64) -> Self {
        Self {
            width,
            height,
            origin,
            pixel_size,
            epsg: Some(4326),
            nodata: Some(NODATA),
        }
    }

    pub fn with_origin(mut self, origin: (f64, f64)) -> Self {
        self.origin = origin;
        self
    }

    pub fn without_crs(mut self) -> Self {
        self.epsg = None;
        self
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Writes a single-band float32 GeoTIFF with scale/tiepoint georeferencing.
///
/// Panics on I/O failure; intended for test setup only.
pub fn write_geotiff(path: &Path, fixture: &GeoTiffFixture, data: &[f32]) {
    assert_eq!(
        data.len(),
        fixture.pixel_count(),
        "fixture data does not match {}x{}",
        fixture.width,
        fixture.height
    );
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create fixture directory");
    }

    let file = File::create(path).expect("Failed to create fixture file");
    let mut encoder = TiffEncoder::new(file).expect("Failed to start TIFF encoder");
    let mut image = encoder
        .new_image::<colortype::Gray32Float>(fixture.width, fixture.height)
        .expect("Failed to start TIFF image");

    let scale = [fixture.pixel_size, fixture.pixel_size, 0.0];
    let tiepoint = [0.0, 0.0, 0.0, fixture.origin.0, fixture.origin.1, 0.0];
    image
        .encoder()
        .write_tag(Tag::ModelPixelScaleTag, &scale[..])
        .expect("Failed to write pixel scale");
    image
        .encoder()
        .write_tag(Tag::ModelTiepointTag, &tiepoint[..])
        .expect("Failed to write tiepoint");

    if let Some(epsg) = fixture.epsg {
        let geographic = matches!(epsg, 4326 | 4258 | 4269);
        let (model_type, crs_key) = if geographic { (2, 2048) } else { (1, 3072) };
        // Header, GTModelType, GTRasterType (PixelIsArea), CRS key
        let geokeys: [u16; 16] = [
            1, 1, 0, 3, //
            1024, 0, 1, model_type, //
            1025, 0, 1, 1, //
            crs_key, 0, 1, epsg,
        ];
        image
            .encoder()
            .write_tag(Tag::GeoKeyDirectoryTag, &geokeys[..])
            .expect("Failed to write GeoKey directory");
    }

    if let Some(nodata) = fixture.nodata {
        image
            .encoder()
            .write_tag(Tag::GdalNodata, nodata.to_string().as_str())
            .expect("Failed to write nodata");
    }

    image.write_data(data).expect("Failed to write raster data");
}
