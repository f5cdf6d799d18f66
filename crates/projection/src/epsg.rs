//! PROJ.4 definitions for the EPSG codes the flood pipeline meets.

use flood_common::Crs;

/// PROJ.4 definition string for `crs`, if known.
///
/// Covers the geographic systems used for output, the Equi7 Europe grid the
/// JRC depth tiles are delivered in, the ETRS89 LAEA grid and all WGS84 UTM
/// zones (EPSG:32601-32660 north, 32701-32760 south).
pub fn proj_definition(crs: Crs) -> Option<String> {
    let def = match crs.epsg() {
        4326 => "+proj=longlat +datum=WGS84 +no_defs".to_string(),
        4258 => "+proj=longlat +ellps=GRS80 +no_defs".to_string(),
        4269 => "+proj=longlat +datum=NAD83 +no_defs".to_string(),
        3857 => "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +no_defs"
            .to_string(),
        3035 => "+proj=laea +lat_0=52 +lon_0=10 +x_0=4321000 +y_0=3210000 +ellps=GRS80 +units=m +no_defs"
            .to_string(),
        27704 => "+proj=aeqd +lat_0=53 +lon_0=24 +x_0=5837287.81977 +y_0=2121415.69617 +datum=WGS84 +units=m +no_defs"
            .to_string(),
        code @ 32601..=32660 => {
            format!("+proj=utm +zone={} +datum=WGS84 +units=m +no_defs", code - 32600)
        }
        code @ 32701..=32760 => format!(
            "+proj=utm +zone={} +south +datum=WGS84 +units=m +no_defs",
            code - 32700
        ),
        _ => return None,
    };
    Some(def)
}
