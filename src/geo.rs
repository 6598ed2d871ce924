use crate::model::Location;

/// Cities the dashboard map knows how to place. Anything else gets null
/// coordinates and is skipped by the map layer.
const CITY_COORDS: &[(&str, f64, f64)] = &[
    ("Toronto", 43.6532, -79.3832),
    ("Waterloo", 43.4643, -80.5204),
    ("Vancouver", 49.2827, -123.1207),
    ("Montreal", 45.5017, -73.5673),
    ("Ottawa", 45.4215, -75.6972),
    ("Calgary", 51.0447, -114.0719),
    ("New York", 40.7128, -74.006),
    ("San Francisco", 37.7749, -122.4194),
    ("London", 42.9849, -81.2453),
    ("Seattle", 47.6062, -122.3321),
    ("Austin", 30.2672, -97.7431),
    ("Markham", 43.8561, -79.337),
    ("Mississauga", 43.589, -79.6441),
];

pub fn lookup(city: &str) -> Location {
    CITY_COORDS
        .iter()
        .find(|(name, _, _)| *name == city)
        .map(|(_, lat, lng)| Location {
            lat: Some(*lat),
            lng: Some(*lng),
        })
        .unwrap_or(Location {
            lat: None,
            lng: None,
        })
}

// ── Tests ──
