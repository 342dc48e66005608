// SPDX-License-Identifier: Apache-2.0

use crate::ApiErrorCode;
use serde_json::{json, Value};

fn error_response(description: &str) -> Value {
    json!({
        "description": description,
        "content": {"application/json": {"schema": {"$ref": "#/components/schemas/ApiError"}}}
    })
}

fn beacon_post(summary: &str, schema: &str) -> Value {
    json!({
        "post": {
            "summary": summary,
            "requestBody": {
                "required": true,
                "content": {"application/json": {"schema": {"$ref": format!("#/components/schemas/{schema}")}}}
            },
            "responses": {
                "200": {"description": "accepted", "content": {"application/json": {"schema": {"$ref": "#/components/schemas/AckResponse"}}}},
                "400": error_response("validation failed"),
                "413": error_response("payload too large"),
                "429": error_response("rate limited"),
                "500": error_response("internal error")
            }
        }
    })
}

fn ab_test_post(summary: &str) -> Value {
    let mut op = beacon_post(summary, "AbTestRequest");
    op["post"]["responses"]["404"] = error_response("experiment not found or inactive");
    op
}

fn string_props(names: &[&str]) -> Value {
    let mut props = serde_json::Map::new();
    for name in names {
        props.insert((*name).to_string(), json!({"type": "string"}));
    }
    Value::Object(props)
}

#[must_use]
pub fn openapi_v1_spec() -> Value {
    let error_codes: Vec<&str> = ApiErrorCode::ALL.iter().map(|c| c.as_str()).collect();
    let admin_id_param = json!({"name": "id", "in": "path", "required": true, "schema": {"type": "string"}});
    json!({
      "openapi": "3.0.3",
      "info": {
        "title": "folio API",
        "version": "v1"
      },
      "paths": {
        "/healthz": {"get": {"responses": {"200": {"description": "ok"}}}},
        "/readyz": {
          "get": {
            "responses": {
              "200": {"description": "ready"},
              "503": error_response("store unavailable")
            }
          }
        },
        "/openapi.json": {"get": {"responses": {"200": {"description": "this document"}}}},
        "/analytics/ab-test/assign": ab_test_post("record a variant exposure"),
        "/analytics/ab-test/convert": ab_test_post("record a conversion for an assigned session"),
        "/analytics/session": beacon_post("start or end a browsing session", "SessionRequest"),
        "/analytics/pageview": beacon_post("record a page view", "PageViewRequest"),
        "/analytics/performance": beacon_post("record web vitals", "PerformanceRequest"),
        "/analytics/engagement": beacon_post("record an engagement event", "EngagementRequest"),
        "/analytics/conversion": beacon_post("record a conversion", "ConversionRequest"),
        "/admin/ab-tests": {
          "get": {
            "security": [{"apiKey": []}],
            "responses": {
              "200": {"description": "experiment list"},
              "401": error_response("missing or unknown api key"),
              "403": error_response("admin role required")
            }
          },
          "post": {
            "security": [{"apiKey": []}],
            "requestBody": {
              "required": true,
              "content": {"application/json": {"schema": {"$ref": "#/components/schemas/CreateExperimentRequest"}}}
            },
            "responses": {
              "201": {"description": "created"},
              "400": error_response("validation failed"),
              "401": error_response("missing or unknown api key"),
              "403": error_response("admin role required"),
              "409": error_response("experiment name already exists")
            }
          }
        },
        "/admin/ab-tests/{id}": {
          "get": {
            "security": [{"apiKey": []}],
            "parameters": [admin_id_param.clone()],
            "responses": {"200": {"description": "experiment"}, "404": error_response("not found")}
          },
          "patch": {
            "security": [{"apiKey": []}],
            "parameters": [admin_id_param.clone()],
            "requestBody": {
              "required": true,
              "content": {"application/json": {"schema": {"$ref": "#/components/schemas/UpdateExperimentRequest"}}}
            },
            "responses": {
              "200": {"description": "updated experiment"},
              "400": error_response("validation failed"),
              "404": error_response("not found")
            }
          },
          "delete": {
            "security": [{"apiKey": []}],
            "parameters": [admin_id_param],
            "responses": {"200": {"description": "deleted"}, "404": error_response("not found")}
          }
        },
        "/admin/analytics": {
          "get": {
            "security": [{"apiKey": []}],
            "parameters": [
              {"name": "range", "in": "query", "schema": {"type": "string", "enum": ["1h", "24h", "7d", "30d", "90d", "1y"], "default": "7d"}}
            ],
            "responses": {
              "200": {"description": "dashboard report"},
              "401": error_response("missing or unknown api key"),
              "403": error_response("admin role required")
            }
          }
        }
      },
      "components": {
        "securitySchemes": {
          "apiKey": {"type": "apiKey", "in": "header", "name": "x-api-key"}
        },
        "schemas": {
          "AbTestRequest": {
            "type": "object",
            "required": ["sessionId", "experimentName", "variant"],
            "properties": string_props(&["sessionId", "experimentName", "variant"])
          },
          "AckResponse": {
            "type": "object",
            "required": ["success"],
            "properties": {"success": {"type": "boolean"}, "error": {"type": "string"}}
          },
          "ApiError": {
            "type": "object",
            "required": ["success", "error", "code", "details", "requestId"],
            "additionalProperties": false,
            "properties": {
              "success": {"type": "boolean"},
              "error": {"type": "string"},
              "code": {"$ref": "#/components/schemas/ApiErrorCode"},
              "details": {"type": "object"},
              "requestId": {"type": "string"}
            }
          },
          "ApiErrorCode": {"type": "string", "enum": error_codes},
          "ConversionRequest": {
            "type": "object",
            "required": ["sessionId", "type", "page"],
            "properties": string_props(&["sessionId", "type", "page"])
          },
          "CreateExperimentRequest": {
            "type": "object",
            "required": ["name"],
            "additionalProperties": false,
            "properties": {
              "name": {"type": "string"},
              "description": {"type": "string"},
              "trafficSplit": {"type": "integer", "minimum": 0, "maximum": 100},
              "targetPages": {"type": "array", "items": {"type": "string"}},
              "component": {"type": "string"},
              "controlVersion": {"type": "object"},
              "variantVersion": {"type": "object"},
              "primaryGoal": {"type": "string"},
              "successMetric": {"type": "string"}
            }
          },
          "EngagementRequest": {
            "type": "object",
            "required": ["sessionId", "page", "event"],
            "properties": string_props(&["sessionId", "page", "event"])
          },
          "PageViewRequest": {
            "type": "object",
            "required": ["sessionId", "path"],
            "properties": string_props(&["sessionId", "path", "title", "referer"])
          },
          "PerformanceRequest": {
            "type": "object",
            "required": ["sessionId", "page", "metrics"],
            "properties": string_props(&["sessionId", "page"])
          },
          "SessionRequest": {
            "type": "object",
            "required": ["sessionId", "action"],
            "properties": string_props(&["sessionId", "action", "page", "referer"])
          },
          "UpdateExperimentRequest": {
            "type": "object",
            "additionalProperties": false,
            "properties": {
              "isActive": {"type": "boolean"},
              "trafficSplit": {"type": "integer", "minimum": 0, "maximum": 100}
            }
          }
        }
      }
    })
}
