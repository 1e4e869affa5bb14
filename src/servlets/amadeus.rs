//! Amadeus flight offers, cheapest dates and destination inspiration.

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};

use super::schema;
use crate::clients::amadeus::{AmadeusClient, DEFAULT_BASE};
use crate::core::{Args, CallResult, Servlet, ServletError, ToolDescription};
use crate::infra::config::ServletConfig;
use crate::infra::runtime::token::TokenCache;

const TRAVEL_CLASSES: &[&str] = &["ECONOMY", "PREMIUM_ECONOMY", "BUSINESS", "FIRST"];

pub struct AmadeusServlet {
    config: ServletConfig,
    token: TokenCache<String>,
}

impl AmadeusServlet {
    pub const NAME: &'static str = "amadeus";

    pub fn new(config: ServletConfig) -> Self {
        Self { config, token: TokenCache::new() }
    }

    fn client(&self) -> Result<AmadeusClient, ServletError> {
        Ok(AmadeusClient::new(
            self.config.base_url("base-url", DEFAULT_BASE),
            self.config.require("api-key")?,
            self.config.require("api-secret")?,
            self.token.clone(),
        ))
    }
}

fn offer_query(args: &Args) -> Result<Vec<(&'static str, String)>, ServletError> {
    let mut q = vec![
        ("originLocationCode", args.require_str("originLocationCode")?.to_ascii_uppercase()),
        ("destinationLocationCode", args.require_str("destinationLocationCode")?.to_ascii_uppercase()),
        ("departureDate", args.require_str("departureDate")?),
    ];
    let adults = args.require_i64("adults")?;
    if !(1..=9).contains(&adults) {
        return Err(ServletError::invalid("adults must be between 1 and 9"));
    }
    q.push(("adults", adults.to_string()));
    if let Some(r) = args.str("returnDate") {
        q.push(("returnDate", r));
    }
    q.push(("children", args.i64_or("children", 0)?.to_string()));
    q.push(("infants", args.i64_or("infants", 0)?.to_string()));
    let class = args.str("travelClass").unwrap_or_else(|| "ECONOMY".into()).to_ascii_uppercase();
    if !TRAVEL_CLASSES.contains(&class.as_str()) {
        return Err(ServletError::invalid(format!("travelClass must be one of {}", TRAVEL_CLASSES.join(", "))));
    }
    q.push(("travelClass", class));
    q.push(("nonStop", args.bool_or("nonStop", false)?.to_string()));
    q.push(("currencyCode", args.str("currencyCode").unwrap_or_else(|| "USD".into())));
    if let Some(p) = args.i64("maxPrice")? {
        q.push(("maxPrice", p.to_string()));
    }
    q.push(("max", args.i64_or("max", 10)?.to_string()));
    Ok(q)
}

/// Shared optional filters of the dates and inspiration searches.
fn shopping_filters(args: &Args, q: &mut Vec<(&'static str, String)>) -> Result<(), ServletError> {
    for key in ["departureDate", "duration", "viewBy"] {
        if let Some(v) = args.str(key) {
            q.push((key, v));
        }
    }
    for key in ["oneWay", "nonStop"] {
        if let Some(v) = args.bool(key)? {
            q.push((key, v.to_string()));
        }
    }
    if let Some(p) = args.i64("maxPrice")? {
        q.push(("maxPrice", p.to_string()));
    }
    Ok(())
}

fn filter_props(mut props: JsonValue) -> JsonValue {
    let extra = json!({
        "departureDate": { "type": "string", "description": "Date or range, e.g. 2025-06-01 or 2025-06-01,2025-06-15" },
        "oneWay": { "type": "boolean" },
        "duration": { "type": "string", "description": "Stay length in days or a range such as 2,8" },
        "nonStop": { "type": "boolean" },
        "maxPrice": { "type": "integer" },
        "viewBy": { "type": "string", "enum": ["COUNTRY", "DATE", "DESTINATION", "DURATION", "WEEK"] }
    });
    if let (Some(p), JsonValue::Object(e)) = (props.as_object_mut(), extra) {
        p.extend(e);
    }
    props
}

#[async_trait]
impl Servlet for AmadeusServlet {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn describe(&self) -> Vec<ToolDescription> {
        vec![
            ToolDescription::new(
                "am-flights-offer-search",
                "Search flight offers between two airports on a date",
                schema(
                    json!({
                        "originLocationCode": { "type": "string", "description": "IATA code, e.g. SYD" },
                        "destinationLocationCode": { "type": "string", "description": "IATA code, e.g. BKK" },
                        "departureDate": { "type": "string", "description": "YYYY-MM-DD" },
                        "returnDate": { "type": "string", "description": "YYYY-MM-DD" },
                        "adults": { "type": "integer", "minimum": 1, "maximum": 9 },
                        "children": { "type": "integer", "default": 0 },
                        "infants": { "type": "integer", "default": 0 },
                        "travelClass": { "type": "string", "enum": TRAVEL_CLASSES, "default": "ECONOMY" },
                        "nonStop": { "type": "boolean", "default": false },
                        "currencyCode": { "type": "string", "default": "USD" },
                        "maxPrice": { "type": "integer" },
                        "max": { "type": "integer", "default": 10 }
                    }),
                    &["originLocationCode", "destinationLocationCode", "departureDate", "adults"],
                ),
            ),
            ToolDescription::new(
                "am-flight-dates",
                "Cheapest dates to fly between two cities",
                schema(
                    filter_props(json!({
                        "origin": { "type": "string", "description": "IATA code" },
                        "destination": { "type": "string", "description": "IATA code" }
                    })),
                    &["origin", "destination"],
                ),
            ),
            ToolDescription::new(
                "am-flight-inspiration",
                "Cheapest destinations from an origin",
                schema(filter_props(json!({ "origin": { "type": "string", "description": "IATA code" } })), &["origin"]),
            ),
        ]
    }

    async fn call(&self, tool: &str, args: &Args) -> Result<CallResult, ServletError> {
        let out = match tool {
            "am-flights-offer-search" => {
                let q = offer_query(args)?;
                self.client()?
                    .get("v2/shopping/flight-offers", &q, "searching for flight offers")
                    .await?
            }
            "am-flight-dates" => {
                let mut q = vec![
                    ("origin", args.require_str("origin")?.to_ascii_uppercase()),
                    ("destination", args.require_str("destination")?.to_ascii_uppercase()),
                ];
                shopping_filters(args, &mut q)?;
                self.client()?
                    .get("v1/shopping/flight-dates", &q, "searching for flight dates")
                    .await?
            }
            "am-flight-inspiration" => {
                let mut q = vec![("origin", args.require_str("origin")?.to_ascii_uppercase())];
                shopping_filters(args, &mut q)?;
                self.client()?
                    .get("v1/shopping/flight-destinations", &q, "searching for flight destinations")
                    .await?
            }
            other => return Err(ServletError::UnknownTool(other.to_string())),
        };
        Ok(CallResult::text(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn args(v: JsonValue) -> Args {
        Args::from_value(&v).unwrap()
    }

    #[test]
    fn offer_query_applies_defaults() {
        let q = offer_query(&args(json!({
            "originLocationCode": "syd", "destinationLocationCode": "BKK",
            "departureDate": "2025-05-02", "adults": "2", "travelClass": "business"
        })))
        .unwrap();
        let get = |k: &str| q.iter().find(|(n, _)| *n == k).map(|(_, v)| v.as_str());
        assert_eq!(get("originLocationCode"), Some("SYD"));
        assert_eq!(get("adults"), Some("2"));
        assert_eq!(get("travelClass"), Some("BUSINESS"));
        assert_eq!(get("currencyCode"), Some("USD"));
        assert_eq!(get("nonStop"), Some("false"));
        assert_eq!(get("max"), Some("10"));
        assert_eq!(get("children"), Some("0"));
        assert_eq!(get("returnDate"), None);
    }

    #[test]
    fn offer_query_validates() {
        let base = json!({"originLocationCode":"A","destinationLocationCode":"B","departureDate":"2025-01-01"});
        assert_eq!(
            offer_query(&args(base.clone())).unwrap_err().to_string(),
            "missing required argument: adults"
        );
        let mut bad = base;
        bad["adults"] = json!(1);
        bad["travelClass"] = json!("steerage");
        assert!(offer_query(&args(bad)).unwrap_err().to_string().starts_with("travelClass must be one of"));
    }

    #[tokio::test]
    async fn inspiration_search_end_to_end() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1/security/oauth2/token");
            then.status(200).body("{\"access_token\":\"tok\",\"expires_in\":1799}");
        });
        let m = server.mock(|when, then| {
            when.method(GET)
                .path("/v1/shopping/flight-destinations")
                .query_param("origin", "MAD")
                .query_param("oneWay", "true")
                .query_param("maxPrice", "200");
            then.status(200).body("{\"data\":[{\"destination\":\"LIS\"}]}");
        });
        let s = AmadeusServlet::new(ServletConfig::from_pairs(
            "amadeus",
            [("base-url", server.base_url().as_str()), ("api-key", "k"), ("api-secret", "s")],
        ));
        let out = s
            .call("am-flight-inspiration", &args(json!({"origin":"mad","oneWay":true,"maxPrice":200})))
            .await
            .unwrap();
        m.assert();
        assert!(out.first_text().unwrap().contains("LIS"));
    }
}
