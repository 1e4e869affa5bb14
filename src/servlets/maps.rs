//! Google Maps Static API images.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Map, Value as JsonValue};

use super::schema;
use crate::clients::maps::{MapsClient, DEFAULT_BASE};
use crate::core::{Args, CallResult, Content, Servlet, ServletError, ToolDescription};
use crate::infra::config::ServletConfig;

const LOCATION: &str =
    "A comma separated latitude,longitude pair (e.g. '40.714728,-73.998672') or an address (e.g. 'city hall, new york, ny')";
const STYLE_RULES: &[&str] = &["hue", "lightness", "saturation", "gamma", "color", "weight"];

pub struct MapsServlet {
    config: ServletConfig,
}

impl MapsServlet {
    pub const NAME: &'static str = "google-maps-image";

    pub fn new(config: ServletConfig) -> Self {
        Self { config }
    }
}

/// Scalar or list field as the API expects it; lists are `|`-joined.
fn field(obj: &Map<String, JsonValue>, key: &str) -> Option<String> {
    match obj.get(key)? {
        JsonValue::String(s) if s.trim().is_empty() => None,
        JsonValue::String(s) => Some(s.trim().to_string()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        JsonValue::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .filter_map(|v| match v {
                    JsonValue::String(s) => Some(s.trim().to_string()),
                    JsonValue::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .filter(|s| !s.is_empty())
                .collect();
            (!parts.is_empty()).then(|| parts.join("|"))
        }
        _ => None,
    }
}

fn hex(color: String) -> String {
    color.replace('#', "0x")
}

fn objects(args: &Args, key: &str) -> Result<Vec<Map<String, JsonValue>>, ServletError> {
    args.array(key)?
        .into_iter()
        .map(|v| match v {
            JsonValue::Object(m) => Ok(m),
            _ => Err(ServletError::invalid(format!("{key} must be a list of objects"))),
        })
        .collect()
}

fn marker_spec(m: &Map<String, JsonValue>) -> String {
    let mut parts = Vec::new();
    if let Some(v) = field(m, "label") {
        parts.push(format!("label:{v}"));
    }
    if let Some(v) = field(m, "color") {
        parts.push(format!("color:{}", hex(v)));
    }
    if let Some(v) = field(m, "size") {
        parts.push(format!("size:{v}"));
    }
    if let Some(v) = field(m, "icon") {
        parts.push(format!("icon:{v}"));
    }
    parts.extend(field(m, "location").or_else(|| field(m, "locations")));
    parts.join("|")
}

fn path_spec(p: &Map<String, JsonValue>) -> String {
    let mut parts = Vec::new();
    if let Some(v) = field(p, "color") {
        parts.push(format!("color:{}", hex(v)));
    }
    if let Some(v) = field(p, "weight") {
        parts.push(format!("weight:{v}"));
    }
    if let Some(v) = field(p, "fillcolor") {
        parts.push(format!("fillcolor:{}", hex(v)));
    }
    if let Some(v) = field(p, "geodesic") {
        parts.push(format!("geodesic:{v}"));
    }
    parts.extend(field(p, "points"));
    parts.join("|")
}

fn style_spec(s: &Map<String, JsonValue>) -> String {
    let mut parts = Vec::new();
    if let Some(v) = field(s, "feature") {
        parts.push(format!("feature:{v}"));
    }
    if let Some(v) = field(s, "element") {
        parts.push(format!("element:{v}"));
    }
    for rule in STYLE_RULES {
        if let Some(v) = field(s, rule) {
            let v = if *rule == "color" { hex(v) } else { v };
            parts.push(format!("{rule}:{v}"));
        }
    }
    parts.push(format!("visibility:{}", field(s, "visibility").unwrap_or_else(|| "on".into())));
    parts.join("|")
}

/// Query parameters for a static map request, minus `format` and `key`.
fn map_params(args: &Args, center_required: bool) -> Result<Vec<(&'static str, String)>, ServletError> {
    let mut q = Vec::new();
    match (args.str("center"), center_required) {
        (Some(c), _) => q.push(("center", c)),
        (None, true) => return Err(ServletError::MissingArgument("center".into())),
        (None, false) => {}
    }
    match (args.f64("zoom")?, center_required) {
        (Some(z), _) => q.push(("zoom", z.to_string())),
        (None, true) => return Err(ServletError::MissingArgument("zoom".into())),
        (None, false) => {}
    }
    q.push(("size", args.require_str("size")?));
    q.push(("scale", args.i64_or("scale", 2)?.to_string()));
    q.push(("maptype", args.str("maptype").unwrap_or_else(|| "roadmap".into())));
    for key in ["language", "region", "map_id"] {
        if let Some(v) = args.str(key) {
            q.push((key, v));
        }
    }
    let markers = objects(args, "markers")?;
    if !center_required && markers.is_empty() {
        return Err(ServletError::MissingArgument("markers".into()));
    }
    q.extend(markers.iter().map(|m| ("markers", marker_spec(m))));
    q.extend(objects(args, "path")?.iter().map(|p| ("path", path_spec(p))));
    q.extend(objects(args, "style")?.iter().map(|s| ("style", style_spec(s))));
    for v in objects(args, "visible")? {
        if let Some(loc) = field(&v, "location") {
            q.push(("visible", loc));
        }
    }
    Ok(q)
}

fn map_props() -> JsonValue {
    json!({
        "center": { "type": "string", "description": format!("Center of the map. {LOCATION}") },
        "zoom": { "type": "number", "description": "Zoom level, 0 (world) to 21 (buildings)" },
        "size": { "type": "string", "description": "Image size as {width}x{height}, e.g. 500x400" },
        "scale": { "type": "integer", "enum": [1, 2, 4], "default": 2 },
        "maptype": { "type": "string", "enum": ["roadmap", "satellite", "hybrid", "terrain"], "default": "roadmap" },
        "language": { "type": "string", "description": "Language of map labels" },
        "region": { "type": "string", "description": "Two character ccTLD region code for border display" },
        "map_id": { "type": "string", "description": "Identifier of a styled map" },
        "markers": {
            "type": "array",
            "items": {
                "type": "object",
                "properties": {
                    "label": { "type": "string", "description": "Single uppercase alphanumeric character" },
                    "color": { "type": "string", "description": "Named color or #RRGGBB" },
                    "size": { "type": "string", "enum": ["tiny", "mid", "small", "normal"] },
                    "icon": { "type": "string", "description": "Public URL of a custom icon" },
                    "location": { "type": "string", "description": LOCATION }
                },
                "required": ["location"]
            }
        },
        "path": {
            "type": "array",
            "items": {
                "type": "object",
                "properties": {
                    "color": { "type": "string" },
                    "weight": { "type": "number", "description": "Line width in pixels" },
                    "fillcolor": { "type": "string", "description": "Fill color, e.g. #000000" },
                    "geodesic": { "type": "boolean" },
                    "points": { "type": "string", "description": "Points separated by |, or an enc: polyline" }
                },
                "required": ["points"]
            }
        },
        "style": {
            "type": "array",
            "items": {
                "type": "object",
                "properties": {
                    "feature": { "type": "string", "description": "Feature to style, e.g. all or road" },
                    "element": { "type": "string", "description": "all, geometry or labels" },
                    "color": { "type": "string" },
                    "hue": { "type": "string" },
                    "lightness": { "type": "number" },
                    "saturation": { "type": "number" },
                    "gamma": { "type": "number" },
                    "weight": { "type": "number" },
                    "visibility": { "type": "string", "enum": ["on", "off", "simplified"], "default": "on" }
                }
            }
        },
        "visible": {
            "type": "array",
            "items": {
                "type": "object",
                "properties": { "location": { "type": "string", "description": LOCATION } },
                "required": ["location"]
            }
        }
    })
}

#[async_trait]
impl Servlet for MapsServlet {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn describe(&self) -> Vec<ToolDescription> {
        vec![
            ToolDescription::new(
                "google-maps-static-api-center",
                "Returns a map image centered on `center`, with optional markers, paths and styles",
                schema(map_props(), &["center", "zoom", "size"]),
            ),
            ToolDescription::new(
                "google-maps-static-api-markers",
                "Returns a map image framed around the given `markers`; prefer this for paths or several markers",
                schema(map_props(), &["markers", "size"]),
            ),
        ]
    }

    async fn call(&self, tool: &str, args: &Args) -> Result<CallResult, ServletError> {
        let params = match tool {
            "google-maps-static-api-center" => map_params(args, true)?,
            "google-maps-static-api-markers" => map_params(args, false)?,
            other => return Err(ServletError::UnknownTool(other.to_string())),
        };
        let client = MapsClient::new(self.config.base_url("base-url", DEFAULT_BASE), self.config.require("api-key")?);
        let image = client.static_map(&params).await?;
        tracing::debug!(bytes = image.bytes.len(), mime = %image.mime_type, "map image fetched");
        Ok(CallResult::with(vec![Content::image(STANDARD.encode(&image.bytes), image.mime_type)]))
    }
}
