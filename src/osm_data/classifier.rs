use crate::map_data::osm::OsmWay;

pub const MOTORIZED_HIGHWAY_VALUES: [&str; 12] = [
    "motorway",
    "motorway_link",
    "trunk",
    "trunk_link",
    "primary",
    "primary_link",
    "secondary",
    "secondary_link",
    "tertiary",
    "tertiary_link",
    "residential",
    "unclassified",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityClass {
    Keep,
    Discard,
}

pub fn classify_road_type(road_type: Option<&str>) -> EntityClass {
    match road_type {
        Some(road_type) if MOTORIZED_HIGHWAY_VALUES.contains(&road_type) => EntityClass::Keep,
        _ => EntityClass::Discard,
    }
}

pub fn classify_way(way: &OsmWay) -> EntityClass {
    classify_road_type(way.road_type())
}
