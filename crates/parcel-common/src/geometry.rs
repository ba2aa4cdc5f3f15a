//! GeoJSON geometry and feature types.
//!
//! Parcel outlines and feature-service responses both arrive as GeoJSON.
//! Only the simple geometry types are modelled; a `GeometryCollection` in a
//! payload is rejected at deserialization time.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::BoundingBox;

/// A single coordinate pair. Extra ordinates (z, m) are dropped on input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "[f64; 2]")]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl TryFrom<Vec<f64>> for Position {
    type Error = String;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        match values.as_slice() {
            [x, y, ..] => Ok(Position::new(*x, *y)),
            _ => Err(format!(
                "position needs at least 2 ordinates, got {}",
                values.len()
            )),
        }
    }
}

impl From<Position> for [f64; 2] {
    fn from(p: Position) -> Self {
        [p.x, p.y]
    }
}

impl From<[f64; 2]> for Position {
    fn from([x, y]: [f64; 2]) -> Self {
        Position::new(x, y)
    }
}

/// GeoJSON geometry types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point {
        coordinates: Position,
    },

    MultiPoint {
        coordinates: Vec<Position>,
    },

    LineString {
        coordinates: Vec<Position>,
    },

    MultiLineString {
        coordinates: Vec<Vec<Position>>,
    },

    /// Array of linear rings (first is exterior, rest are holes).
    Polygon {
        coordinates: Vec<Vec<Position>>,
    },

    MultiPolygon {
        coordinates: Vec<Vec<Vec<Position>>>,
    },
}

impl Geometry {
    /// Create a polygon from a single exterior ring.
    pub fn polygon(exterior: Vec<[f64; 2]>) -> Self {
        Geometry::Polygon {
            coordinates: vec![exterior.into_iter().map(Position::from).collect()],
        }
    }

    /// Axis-aligned rectangle as a closed polygon ring.
    pub fn rectangle(bbox: &BoundingBox) -> Self {
        Geometry::polygon(vec![
            [bbox.min_x, bbox.min_y],
            [bbox.min_x, bbox.max_y],
            [bbox.max_x, bbox.max_y],
            [bbox.max_x, bbox.min_y],
            [bbox.min_x, bbox.min_y],
        ])
    }

    /// All positions of the geometry, in document order.
    pub fn positions(&self) -> Vec<Position> {
        match self {
            Geometry::Point { coordinates } => vec![*coordinates],
            Geometry::MultiPoint { coordinates } | Geometry::LineString { coordinates } => {
                coordinates.clone()
            }
            Geometry::MultiLineString { coordinates } | Geometry::Polygon { coordinates } => {
                coordinates.iter().flatten().copied().collect()
            }
            Geometry::MultiPolygon { coordinates } => {
                coordinates.iter().flatten().flatten().copied().collect()
            }
        }
    }

    /// True when the geometry holds no coordinates at all.
    pub fn is_empty(&self) -> bool {
        match self {
            Geometry::Point { .. } => false,
            Geometry::MultiPoint { coordinates } | Geometry::LineString { coordinates } => {
                coordinates.is_empty()
            }
            Geometry::MultiLineString { coordinates } | Geometry::Polygon { coordinates } => {
                coordinates.iter().all(|ring| ring.is_empty())
            }
            Geometry::MultiPolygon { coordinates } => coordinates
                .iter()
                .all(|poly| poly.iter().all(|ring| ring.is_empty())),
        }
    }

    /// Bounding box of all positions, `None` when empty.
    pub fn bounds(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(self.positions().into_iter().map(<[f64; 2]>::from))
    }

    /// Rebuild the geometry with every position passed through `f`.
    pub fn try_map_positions<F, E>(&self, mut f: F) -> Result<Geometry, E>
    where
        F: FnMut(Position) -> Result<Position, E>,
    {
        let mut map_ring = |ring: &Vec<Position>| -> Result<Vec<Position>, E> {
            ring.iter().map(|p| f(*p)).collect()
        };

        Ok(match self {
            Geometry::Point { coordinates } => Geometry::Point {
                coordinates: map_ring(&vec![*coordinates])?[0],
            },
            Geometry::MultiPoint { coordinates } => Geometry::MultiPoint {
                coordinates: map_ring(coordinates)?,
            },
            Geometry::LineString { coordinates } => Geometry::LineString {
                coordinates: map_ring(coordinates)?,
            },
            Geometry::MultiLineString { coordinates } => Geometry::MultiLineString {
                coordinates: coordinates.iter().map(&mut map_ring).collect::<Result<_, _>>()?,
            },
            Geometry::Polygon { coordinates } => Geometry::Polygon {
                coordinates: coordinates.iter().map(&mut map_ring).collect::<Result<_, _>>()?,
            },
            Geometry::MultiPolygon { coordinates } => Geometry::MultiPolygon {
                coordinates: coordinates
                    .iter()
                    .map(|poly| poly.iter().map(&mut map_ring).collect::<Result<Vec<_>, _>>())
                    .collect::<Result<_, _>>()?,
            },
        })
    }
}

/// A GeoJSON Feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub id: Option<Value>,

    /// Features with null geometry are legal GeoJSON and are skipped when drawing.
    #[serde(default)]
    pub geometry: Option<Geometry>,

    #[serde(default)]
    pub properties: Option<Map<String, Value>>,
}

impl Feature {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            id: None,
            geometry: Some(geometry),
            properties: None,
        }
    }

    /// Look up a property by name.
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.as_ref().and_then(|props| props.get(name))
    }

    /// Look up a property and render it as a plain string (numbers included).
    pub fn property_string(&self, name: &str) -> Option<String> {
        match self.property(name)? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

/// A GeoJSON FeatureCollection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    /// Type identifier (always "FeatureCollection").
    #[serde(rename = "type", default = "feature_collection_type")]
    pub type_: String,

    pub features: Vec<Feature>,
}

fn feature_collection_type() -> String {
    "FeatureCollection".to_string()
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            type_: feature_collection_type(),
            features,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Bounds over every non-null feature geometry.
    pub fn bounds(&self) -> Option<BoundingBox> {
        self.features
            .iter()
            .filter_map(|f| f.geometry.as_ref()?.bounds())
            .reduce(|a, b| a.union(&b))
    }
}

impl Default for FeatureCollection {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}
