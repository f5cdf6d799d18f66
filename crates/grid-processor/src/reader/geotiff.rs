//! Single-band GeoTIFF reader.
//!
//! Georeferencing comes from the GeoTIFF tags: `ModelTransformation`, or
//! `ModelPixelScale` + `ModelTiepoint`, for the affine transform; the GeoKey
//! directory for the EPSG code; `GDAL_NODATA` for the sentinel.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use flood_common::{Crs, GeoTransform, RasterGrid};
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;
use tiff::{ColorType, TiffError};

use super::RasterReader;
use crate::error::{GridProcessorError, Result};
use crate::types::RasterTile;

const KEY_MODEL_TYPE: u16 = 1024;
const KEY_RASTER_TYPE: u16 = 1025;
const KEY_GEOGRAPHIC_TYPE: u16 = 2048;
const KEY_PROJECTED_TYPE: u16 = 3072;

const RASTER_PIXEL_IS_POINT: u16 = 2;
const USER_DEFINED: u16 = 32767;

/// Reads `.tif` / `.tiff` depth tiles. Integer samples are widened to f32.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoTiffReader;

#[derive(Debug, Default, PartialEq)]
struct GeoKeys {
    model_type: Option<u16>,
    raster_type: Option<u16>,
    geographic: Option<u16>,
    projected: Option<u16>,
}

impl GeoKeys {
    /// Parse the short-valued entries of a GeoKey directory.
    fn parse(directory: &[u16]) -> Self {
        let mut keys = Self::default();
        if directory.len() < 4 {
            return keys;
        }

        let count = directory[3] as usize;
        for entry in directory[4..].chunks_exact(4).take(count) {
            let (key, location, value) = (entry[0], entry[1], entry[3]);
            // Values stored in other tags are not needed here
            if location != 0 {
                continue;
            }
            match key {
                KEY_MODEL_TYPE => keys.model_type = Some(value),
                KEY_RASTER_TYPE => keys.raster_type = Some(value),
                KEY_GEOGRAPHIC_TYPE => keys.geographic = Some(value),
                KEY_PROJECTED_TYPE => keys.projected = Some(value),
                _ => {}
            }
        }
        keys
    }

    /// EPSG code of the raster, if it names one.
    fn crs(&self) -> Option<Crs> {
        let code = match self.model_type {
            Some(2) => self.geographic,
            _ => self.projected.or(self.geographic),
        }?;
        if code == 0 || code == USER_DEFINED {
            return None;
        }
        Some(Crs::from_epsg(code as u32))
    }
}

struct Header {
    grid: RasterGrid,
    nodata: Option<f32>,
}

fn tiff_error(path: &Path, err: TiffError) -> GridProcessorError {
    GridProcessorError::read_failed(format!("{}: {}", path.display(), err))
}

fn open(path: &Path) -> Result<Decoder<BufReader<File>>> {
    let file = File::open(path)
        .map_err(|e| GridProcessorError::open_failed(format!("{}: {}", path.display(), e)))?;
    let decoder = Decoder::new(BufReader::new(file))
        .map_err(|e| GridProcessorError::open_failed(format!("{}: {}", path.display(), e)))?;
    Ok(decoder.with_limits(Limits::unlimited()))
}

fn f64_tag<R: Read + Seek>(decoder: &mut Decoder<R>, path: &Path, tag: Tag) -> Result<Option<Vec<f64>>> {
    decoder
        .find_tag(tag)
        .and_then(|v| v.map(|v| v.into_f64_vec()).transpose())
        .map_err(|e| tiff_error(path, e))
}

fn read_transform<R: Read + Seek>(decoder: &mut Decoder<R>, path: &Path) -> Result<GeoTransform> {
    if let Some(m) = f64_tag(decoder, path, Tag::ModelTransformationTag)? {
        if m.len() < 16 {
            return Err(GridProcessorError::invalid_metadata(format!(
                "{}: ModelTransformation has {} values",
                path.display(),
                m.len()
            )));
        }
        return Ok(GeoTransform::from_gdal([m[3], m[0], m[1], m[7], m[4], m[5]])?);
    }

    let scale = f64_tag(decoder, path, Tag::ModelPixelScaleTag)?;
    let tiepoint = f64_tag(decoder, path, Tag::ModelTiepointTag)?;
    match (scale, tiepoint) {
        (Some(s), Some(t)) if s.len() >= 2 && t.len() >= 6 => {
            let (sx, sy) = (s[0], s[1]);
            let (i, j, x, y) = (t[0], t[1], t[3], t[4]);
            Ok(GeoTransform::new(x - i * sx, y + j * sy, sx, sy))
        }
        _ => Err(GridProcessorError::invalid_metadata(format!(
            "{}: no georeferencing tags",
            path.display()
        ))),
    }
}

fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>, path: &Path) -> Result<Option<f32>> {
    let text = decoder
        .find_tag(Tag::GdalNodata)
        .and_then(|v| v.map(|v| v.into_string()).transpose())
        .map_err(|e| tiff_error(path, e))?;

    Ok(text.and_then(|s| {
        let trimmed = s.trim_end_matches('\0').trim();
        match trimmed.parse::<f32>() {
            // NaN is already the in-memory missing marker
            Ok(v) if v.is_nan() => None,
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(path = %path.display(), nodata = trimmed, "Ignoring unparseable nodata tag");
                None
            }
        }
    }))
}

fn read_header<R: Read + Seek>(decoder: &mut Decoder<R>, path: &Path) -> Result<Header> {
    match decoder.colortype().map_err(|e| tiff_error(path, e))? {
        ColorType::Gray(_) => {}
        other => {
            return Err(GridProcessorError::UnsupportedFormat(format!(
                "{}: expected a single band, got {:?}",
                path.display(),
                other
            )))
        }
    }

    let (width, height) = decoder.dimensions().map_err(|e| tiff_error(path, e))?;

    let geokeys = decoder
        .find_tag(Tag::GeoKeyDirectoryTag)
        .and_then(|v| v.map(|v| v.into_u16_vec()).transpose())
        .map_err(|e| tiff_error(path, e))?
        .map(|dir| GeoKeys::parse(&dir))
        .unwrap_or_default();

    let mut transform = read_transform(decoder, path)?;
    if geokeys.raster_type == Some(RASTER_PIXEL_IS_POINT) {
        // Tiepoints address pixel centers; move the origin to the corner
        let (x, y) = transform.pixel_to_world(-0.5, -0.5);
        transform.origin_x = x;
        transform.origin_y = y;
    }

    let grid = RasterGrid::new(geokeys.crs(), transform, width as usize, height as usize)?;
    let nodata = read_nodata(decoder, path)?;

    Ok(Header { grid, nodata })
}

fn widen(result: DecodingResult) -> Option<Vec<f32>> {
    #[allow(unreachable_patterns)]
    let data = match result {
        DecodingResult::F32(v) => v,
        DecodingResult::F64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::U8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|x| x as f32).collect(),
        _ => return None,
    };
    Some(data)
}

impl RasterReader for GeoTiffReader {
    fn read_grid(&self, path: &Path) -> Result<RasterGrid> {
        let mut decoder = open(path)?;
        Ok(read_header(&mut decoder, path)?.grid)
    }

    fn read_tile(&self, path: &Path) -> Result<RasterTile> {
        let mut decoder = open(path)?;
        let header = read_header(&mut decoder, path)?;

        let image = decoder.read_image().map_err(|e| tiff_error(path, e))?;
        let data = widen(image).ok_or_else(|| {
            GridProcessorError::UnsupportedFormat(format!("{}: sample type", path.display()))
        })?;

        tracing::trace!(
            path = %path.display(),
            width = header.grid.width,
            height = header.grid.height,
            crs = ?header.grid.crs,
            "Read GeoTIFF"
        );

        RasterTile::new(header.grid, data, header.nodata)
    }
}
