//! Native GeoTIFF reading/writing on top of the `tiff` crate
//!
//! Georeferencing is carried by the standard GeoTIFF tags: ModelPixelScale +
//! ModelTiepoint for axis-aligned grids, ModelTransformation for rotated
//! ones, the GeoKey directory for the EPSG code (with the WKT in the ASCII
//! citation) and GDAL's `GDAL_NODATA` ASCII tag.

use crate::crs::{self, CrsDescriptor, CRS};
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement, DEFAULT_NODATA};
use ndarray::ArrayView2;
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

const MODEL_PIXEL_SCALE: Tag = Tag::ModelPixelScaleTag;
const MODEL_TIEPOINT: Tag = Tag::ModelTiepointTag;
const MODEL_TRANSFORMATION: Tag = Tag::ModelTransformationTag;
const GEO_KEY_DIRECTORY: Tag = Tag::GeoKeyDirectoryTag;
const GEO_ASCII_PARAMS: Tag = Tag::GeoAsciiParamsTag;
const GDAL_NODATA: Tag = Tag::GdalNodata;

const KEY_MODEL_TYPE: u16 = 1024;
const KEY_RASTER_TYPE: u16 = 1025;
const KEY_CITATION: u16 = 1026;
const KEY_GEOGRAPHIC_TYPE: u16 = 2048;
const KEY_PROJECTED_CS_TYPE: u16 = 3072;
const USER_DEFINED: u16 = 32767;

/// Options for writing GeoTIFF files
#[derive(Debug, Clone, Default)]
pub struct GeoTiffOptions {
    /// No-data value written for missing cells; the raster's own sentinel
    /// (or -9999 when it has none) is used when unset
    pub nodata: Option<f64>,
}

/// Read one band of a GeoTIFF file into a Raster
///
/// `band` is 1-based and defaults to the first band. The raster is named
/// after the file stem.
pub fn read_geotiff<T, P>(path: P, band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::open(path)?;
    let raster: Raster<T> = decode_geotiff(BufReader::new(file), band)?;
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(raster.with_name(stem))
}

/// Read a GeoTIFF from an in-memory buffer into a Raster
pub fn read_geotiff_from_buffer<T>(data: &[u8], band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
{
    decode_geotiff(Cursor::new(data), band)
}

fn decode_geotiff<T, R>(reader: R, band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
    R: Read + Seek,
{
    let mut decoder = Decoder::new(reader)?.with_limits(Limits::unlimited());

    let (width, height) = decoder.dimensions()?;
    let rows = height as usize;
    let cols = width as usize;

    let count = decoder
        .get_tag_u32(Tag::SamplesPerPixel)
        .map(|n| n as usize)
        .unwrap_or(1);
    let band = band.unwrap_or(1);
    if band == 0 || band > count {
        return Err(Error::BandOutOfRange { band, count });
    }

    let transform = read_geotransform(&mut decoder);
    let file_nodata = decoder
        .get_tag_ascii_string(GDAL_NODATA)
        .ok()
        .and_then(|s| s.trim_matches(|c: char| c.is_whitespace() || c == '\0').parse::<f64>().ok());
    let crs = read_crs(&mut decoder);

    let (samples, single_precision) = decode_samples(decoder.read_image()?)?;
    if samples.len() != rows * cols * count {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    let data: Vec<T> = samples
        .into_iter()
        .skip(band - 1)
        .step_by(count)
        .map(|v| {
            let missing = file_nodata.is_some_and(|nd| {
                if nd.is_nan() {
                    v.is_nan()
                } else if single_precision {
                    v as f32 == nd as f32
                } else {
                    v == nd
                }
            });
            if missing && T::is_float() {
                T::default_nodata()
            } else {
                T::from_f64(v).unwrap_or_else(T::default_nodata)
            }
        })
        .collect();

    let mut raster = Raster::from_vec(data, rows, cols)?;
    if let Some(transform) = transform {
        raster.set_transform(transform);
    }
    raster.set_crs(crs);
    raster.set_nodata(file_nodata.and_then(T::from_f64));

    Ok(raster)
}

/// Samples widened to f64, and whether they were stored as f32
fn decode_samples(result: DecodingResult) -> Result<(Vec<f64>, bool)> {
    macro_rules! widen {
        ($buf:expr) => {
            $buf.into_iter().map(|v| v as f64).collect()
        };
    }

    let single_precision = matches!(result, DecodingResult::F32(_));
    #[allow(unreachable_patterns)]
    let samples: Vec<f64> = match result {
        DecodingResult::U8(buf) => widen!(buf),
        DecodingResult::U16(buf) => widen!(buf),
        DecodingResult::U32(buf) => widen!(buf),
        DecodingResult::U64(buf) => widen!(buf),
        DecodingResult::I8(buf) => widen!(buf),
        DecodingResult::I16(buf) => widen!(buf),
        DecodingResult::I32(buf) => widen!(buf),
        DecodingResult::I64(buf) => widen!(buf),
        DecodingResult::F32(buf) => widen!(buf),
        DecodingResult::F64(buf) => buf,
        _ => return Err(Error::Tiff("unsupported sample format".into())),
    };
    Ok((samples, single_precision))
}

/// GeoTransform from ModelTransformation, or ModelPixelScale + ModelTiepoint
fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    if let Ok(m) = decoder.get_tag_f64_vec(MODEL_TRANSFORMATION) {
        if m.len() >= 8 {
            return Some(GeoTransform::from_gdal([m[3], m[0], m[1], m[7], m[4], m[5]]));
        }
    }

    let scale = decoder.get_tag_f64_vec(MODEL_PIXEL_SCALE).ok()?;
    let tiepoint = decoder.get_tag_f64_vec(MODEL_TIEPOINT).ok()?;
    if scale.len() < 2 || tiepoint.len() < 6 {
        return None;
    }

    // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
    let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
    let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
    Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]))
}

/// EPSG code from the GeoKey directory, else the WKT citation, else WGS84
fn read_crs<R: Read + Seek>(decoder: &mut Decoder<R>) -> CRS {
    let mut code = None;
    if let Ok(keys) = decoder.get_tag_u16_vec(GEO_KEY_DIRECTORY) {
        for entry in keys.get(4..).unwrap_or_default().chunks_exact(4) {
            let (id, location, value) = (entry[0], entry[1], entry[3]);
            if location != 0 || value == USER_DEFINED {
                continue;
            }
            match id {
                KEY_PROJECTED_CS_TYPE => code = Some(value as u32),
                KEY_GEOGRAPHIC_TYPE if code.is_none() => code = Some(value as u32),
                _ => {}
            }
        }
    }

    let citation = decoder
        .get_tag_ascii_string(GEO_ASCII_PARAMS)
        .ok()
        .map(|s| s.trim_end_matches(['|', '\0']).to_string())
        .filter(|s| !s.is_empty());

    match (code, citation) {
        // The citation keeps the original WKT when it agrees with the key
        (Some(code), Some(text)) => match crs::try_resolve(&CrsDescriptor::parse(&text)) {
            Ok(crs) if crs.code() == code => crs,
            _ => crs::resolve(&CrsDescriptor::Epsg(code)),
        },
        (Some(code), None) => crs::resolve(&CrsDescriptor::Epsg(code)),
        (None, Some(text)) => crs::resolve(&CrsDescriptor::parse(&text)),
        (None, None) => {
            tracing::warn!("GeoTIFF carries no spatial reference; assuming WGS84 (EPSG:4326)");
            CRS::wgs84()
        }
    }
}

/// Write a Raster to a GeoTIFF file as 32-bit float
pub fn write_geotiff<T, P>(
    raster: &Raster<T>,
    path: P,
    options: Option<GeoTiffOptions>,
) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    encode_geotiff(raster, &mut writer, options.unwrap_or_default())?;
    writer.flush()?;
    Ok(())
}

/// Write a Raster to an in-memory GeoTIFF buffer
pub fn write_geotiff_to_buffer<T>(
    raster: &Raster<T>,
    options: Option<GeoTiffOptions>,
) -> Result<Vec<u8>>
where
    T: RasterElement,
{
    let mut buf = Vec::new();
    encode_geotiff(raster, Cursor::new(&mut buf), options.unwrap_or_default())?;
    Ok(buf)
}

fn encode_geotiff<T, W>(raster: &Raster<T>, writer: W, options: GeoTiffOptions) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
{
    let nodata = options
        .nodata
        .or_else(|| raster.nodata().and_then(|v| v.to_f64()))
        .filter(|v| !v.is_nan())
        .unwrap_or(DEFAULT_NODATA);

    encode_grid(
        raster.view(),
        |v| raster.is_nodata(v),
        raster.transform(),
        raster.crs(),
        nodata,
        writer,
    )
}

/// Encode a bare grid; cells flagged by `is_missing` are written as `nodata`
pub(crate) fn encode_grid<T, W>(
    grid: ArrayView2<'_, T>,
    is_missing: impl Fn(T) -> bool,
    transform: &GeoTransform,
    crs: &CRS,
    nodata: f64,
    writer: W,
) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
{
    let (rows, cols) = grid.dim();
    if rows == 0 || cols == 0 {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    let data: Vec<f32> = grid
        .iter()
        .map(|&v| match v.to_f64() {
            Some(x) if !is_missing(v) && !x.is_nan() => x as f32,
            _ => nodata as f32,
        })
        .collect();

    let mut encoder = TiffEncoder::new(writer)?;
    let mut image = encoder.new_image::<Gray32Float>(cols as u32, rows as u32)?;

    if transform.is_north_up() {
        let scale = [transform.pixel_width, -transform.pixel_height, 0.0];
        let tiepoint = [0.0, 0.0, 0.0, transform.origin_x, transform.origin_y, 0.0];
        image.encoder().write_tag(MODEL_PIXEL_SCALE, &scale[..])?;
        image.encoder().write_tag(MODEL_TIEPOINT, &tiepoint[..])?;
    } else {
        let t = transform;
        let matrix = [
            t.pixel_width, t.row_rotation, 0.0, t.origin_x,
            t.col_rotation, t.pixel_height, 0.0, t.origin_y,
            0.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ];
        image.encoder().write_tag(MODEL_TRANSFORMATION, &matrix[..])?;
    }

    let citation = format!("{}|", crs.wkt());
    let citation_len = u16::try_from(citation.len()).map_err(|_| {
        Error::Tiff(format!(
            "spatial reference text of {} bytes does not fit the GeoKey directory",
            citation.len()
        ))
    })?;
    let code = u16::try_from(crs.code())
        .ok()
        .filter(|&c| c < USER_DEFINED)
        .unwrap_or(USER_DEFINED);
    let (model_type, code_key) = if crs.is_geographic() {
        (2, KEY_GEOGRAPHIC_TYPE)
    } else {
        (1, KEY_PROJECTED_CS_TYPE)
    };
    let geokeys: Vec<u16> = vec![
        1, 1, 0, 4, // version 1.1.0, 4 keys
        KEY_MODEL_TYPE, 0, 1, model_type,
        KEY_RASTER_TYPE, 0, 1, 1, // RasterPixelIsArea
        KEY_CITATION, 34737, citation_len, 0,
        code_key, 0, 1, code,
    ];
    image.encoder().write_tag(GEO_KEY_DIRECTORY, geokeys.as_slice())?;
    image.encoder().write_tag(GEO_ASCII_PARAMS, citation.as_str())?;
    image.encoder().write_tag(GDAL_NODATA, format_nodata(nodata).as_str())?;

    image.write_data(&data)?;
    Ok(())
}

fn format_nodata(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}
