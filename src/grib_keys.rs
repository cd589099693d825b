//! Names of the GRIB keys and key values this crate reads.
//!
//! Key names are edition independent ecCodes names.

// MARS classification
pub const CLASS: &str = "marsClass";
pub const STREAM: &str = "marsStream";
pub const TYPE: &str = "marsType";

// Parameter
pub const CENTRE: &str = "centre";
pub const CENTRE_DESCRIPTION: &str = "centreDescription";
pub const PARAMETER_ID: &str = "paramId";
pub const SHORT_NAME: &str = "shortName";
pub const UNITS: &str = "units";
pub const NAME: &str = "name";

// Time
pub const REFERENCE_DATE: &str = "dataDate";
pub const REFERENCE_TIME: &str = "dataTime";
pub const STEP: &str = "step";

// Vertical
pub const TYPE_OF_LEVEL: &str = "typeOfLevel";
pub const LEVEL: &str = "level";
pub const PV: &str = "pv";
pub const HYBRID_LEVEL_TYPE: &str = "hybrid";
pub const ISOBARIC_IN_HPA_LEVEL_TYPE: &str = "isobaricInhPa";
pub const ISOBARIC_IN_PA_LEVEL_TYPE: &str = "isobaricInPa";
pub const SURFACE_LEVEL: &str = "surface";

// Data
pub const VALUES: &str = "values";
pub const PACKING_TYPE: &str = "packingType";
pub const PACKING_TYPE_GRID_SIMPLE: &str = "grid_simple";

// Geography
pub const GRID_TYPE: &str = "gridType";
pub const GRID_TYPE_REGULAR_LL: &str = "regular_ll";
pub const GRID_TYPE_SH: &str = "sh";
pub const GRID_SH_M: &str = "M";
pub const GRID_SH_K: &str = "K";
pub const GRID_SH_J: &str = "J";
pub const LATITUDE_OF_FIRST_GRID_POINT: &str = "latitudeOfFirstGridPointInDegrees";
pub const LONGITUDE_OF_FIRST_GRID_POINT: &str = "longitudeOfFirstGridPointInDegrees";
pub const LATITUDE_OF_LAST_GRID_POINT: &str = "latitudeOfLastGridPointInDegrees";
pub const LONGITUDE_OF_LAST_GRID_POINT: &str = "longitudeOfLastGridPointInDegrees";
pub const DELTA_LATITUDE: &str = "jDirectionIncrementInDegrees";
pub const DELTA_LONGITUDE: &str = "iDirectionIncrementInDegrees";
pub const DELTA_LATITUDE_POSITIVE: &str = "jScansPositively";
pub const DELTA_LONGITUDE_NEGATIVE: &str = "iScansNegatively";
pub const LATITUDE_MINOR_LONGITUDE_MAJOR: &str = "jPointsAreConsecutive";
pub const NO_LATITUDES: &str = "Nj";
pub const NO_LONGITUDES: &str = "Ni";

// Key namespaces
pub const NAMESPACE_MARS: &str = "mars";
pub const NAMESPACE_PARAMETER: &str = "parameter";
