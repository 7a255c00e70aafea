pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

// equatorial radius, used only for the local flat projection
const FLAT_EARTH_RADIUS_M: f64 = 6_378_137.0;

pub fn get_distance_m(from_lat: &f64, from_lon: &f64, to_lat: &f64, to_lon: &f64) -> f64 {
    let from_lat_rad = from_lat.to_radians();
    let to_lat_rad = to_lat.to_radians();

    let delta_latitude = (to_lat - from_lat).to_radians();
    let delta_longitude = (to_lon - from_lon).to_radians();

    let a = (delta_latitude / 2.0).sin().powi(2)
        + from_lat_rad.cos() * to_lat_rad.cos() * (delta_longitude / 2.0).sin().powi(2);
    let central_angle = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * central_angle
}

pub fn is_valid_location(lat: &f64, lon: &f64) -> bool {
    lat.is_finite()
        && lon.is_finite()
        && (-90.0..=90.0).contains(lat)
        && (-180.0..=180.0).contains(lon)
}

/// Equirectangular projection around `ref_lat`. Good enough for snapping
/// inside a few grid cells, not for anything larger.
pub fn to_flat_m(lat: f64, lon: f64, ref_lat: f64) -> (f64, f64) {
    let x = FLAT_EARTH_RADIUS_M * lon.to_radians() * ref_lat.to_radians().cos();
    let y = FLAT_EARTH_RADIUS_M * lat.to_radians();
    (x, y)
}

pub fn from_flat_m(x: f64, y: f64, ref_lat: f64) -> (f64, f64) {
    let lat = (y / FLAT_EARTH_RADIUS_M).to_degrees();
    let lon = (x / (FLAT_EARTH_RADIUS_M * ref_lat.to_radians().cos())).to_degrees();
    (lat, lon)
}
