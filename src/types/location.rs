/// A geographic coordinate in decimal degrees.
///
/// The tuple holds latitude first and longitude second, the same order the
/// ingestion client sends them as query parameters.
///
/// # Examples
///
/// ```
/// use meteolake::LatLon;
///
/// let london = LatLon(51.5074, -0.1278);
/// assert_eq!(london.0, 51.5074); // Latitude
/// assert_eq!(london.1, -0.1278); // Longitude
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLon(pub f64, pub f64);
