//! Request handlers behind `/api/fashion-advice` and `/api/virtual-tryon`.
//!
//! Both take the wire request, validate it before any model call and answer
//! with a status plus JSON body: 400 for validation failures, 500 for
//! anything the model side got wrong, 200 with the payload otherwise.

use outfitter_contracts::api::{
    EndpointReply, FashionAdviceRequest, LookPayload, TryOnPayload, VirtualTryOnRequest,
};
use outfitter_contracts::OutfitError;
use serde::de::DeserializeOwned;

use crate::request::{AdviceRequest, TryOnRequest};
use crate::Stylist;

pub const FASHION_ADVICE_ROUTE: &str = "/api/fashion-advice";
pub const VIRTUAL_TRY_ON_ROUTE: &str = "/api/virtual-tryon";

pub fn handle_fashion_advice(stylist: &Stylist, request: &FashionAdviceRequest) -> EndpointReply {
    let looks = AdviceRequest::from_api(request, stylist.styles())
        .and_then(|request| stylist.advise(&request));
    match looks {
        Ok(looks) => EndpointReply::ok(&looks.iter().map(LookPayload::from).collect::<Vec<_>>()),
        Err(err) => error_reply(&err),
    }
}

pub fn handle_virtual_try_on(stylist: &Stylist, request: &VirtualTryOnRequest) -> EndpointReply {
    let image = TryOnRequest::from_api(request).and_then(|request| stylist.try_on(&request));
    match image {
        Ok(image) => EndpointReply::ok(&TryOnPayload {
            image: image.to_string(),
        }),
        Err(err) => error_reply(&err),
    }
}

/// Routes a raw JSON body to its handler. Unknown routes are 404 and bodies
/// that do not parse are 400.
pub fn dispatch(stylist: &Stylist, route: &str, body: &str) -> EndpointReply {
    match route.trim_end_matches('/') {
        FASHION_ADVICE_ROUTE => match parse_body::<FashionAdviceRequest>(body) {
            Ok(request) => handle_fashion_advice(stylist, &request),
            Err(reply) => reply,
        },
        VIRTUAL_TRY_ON_ROUTE => match parse_body::<VirtualTryOnRequest>(body) {
            Ok(request) => handle_virtual_try_on(stylist, &request),
            Err(reply) => reply,
        },
        other => EndpointReply::error(404, format!("no handler for {other}")),
    }
}

fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, EndpointReply> {
    serde_json::from_str(body)
        .map_err(|err| EndpointReply::error(400, format!("invalid request body: {err}")))
}

fn error_reply(err: &OutfitError) -> EndpointReply {
    let status = match err {
        OutfitError::Validation(_) => 400,
        _ => 500,
    };
    EndpointReply::error(status, err.to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use outfitter_contracts::api::{
        AdviceOptions, AvatarForApi, FashionAdviceRequest, ItemForApi, VirtualTryOnRequest,
    };
    use outfitter_contracts::catalog::Category;
    use outfitter_contracts::media::DataUri;
    use outfitter_contracts::OutfitError;
    use serde_json::json;

    use super::{dispatch, handle_fashion_advice, handle_virtual_try_on};
    use crate::testing::scripted_stylist;
    use crate::ResponsePart;

    fn item() -> ItemForApi {
        ItemForApi {
            base64: "data:image/png;base64,AAAA".to_string(),
            mime_type: "image/png".to_string(),
            category: Category::Top,
        }
    }

    fn advice_request(items: Vec<ItemForApi>) -> FashionAdviceRequest {
        FashionAdviceRequest {
            items,
            style: "casual".to_string(),
            custom_prompt: String::new(),
            options: AdviceOptions::default(),
        }
    }

    #[test]
    fn advice_validation_is_400_without_model_call() -> anyhow::Result<()> {
        let (stylist, calls) = scripted_stylist(Ok(Vec::new()), Ok(Vec::new()))?;
        let reply = handle_fashion_advice(&stylist, &advice_request(Vec::new()));
        assert_eq!(reply.status, 400);
        assert!(reply.body["error"].is_string());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[test]
    fn advice_success_lists_looks() -> anyhow::Result<()> {
        let (stylist, _) = scripted_stylist(
            Ok(vec![
                ResponsePart::Image(DataUri::new("image/png", "AAAA")),
                ResponsePart::text("denim day"),
                ResponsePart::text("no picture"),
            ]),
            Ok(Vec::new()),
        )?;
        let reply = handle_fashion_advice(&stylist, &advice_request(vec![item()]));
        assert_eq!(reply.status, 200);
        assert_eq!(
            reply.body,
            json!([
                {"image": "data:image/png;base64,AAAA", "description": "denim day"},
                {"image": null, "description": "no picture"}
            ])
        );
        Ok(())
    }

    #[test]
    fn upstream_failures_are_500() -> anyhow::Result<()> {
        let (stylist, _) = scripted_stylist(
            Ok(Vec::new()),
            Err(OutfitError::Transport("timed out".to_string())),
        )?;
        let reply = handle_virtual_try_on(
            &stylist,
            &VirtualTryOnRequest {
                avatar: Some(AvatarForApi {
                    base64: "data:image/png;base64,AVATAR".to_string(),
                    mime_type: "image/png".to_string(),
                }),
                items: vec![item()],
            },
        );
        assert_eq!(reply.status, 500);
        assert_eq!(reply.body, json!({"error": "transport failure: timed out"}));

        let empty = handle_fashion_advice(&stylist, &advice_request(vec![item()]));
        assert_eq!(empty.status, 500);
        Ok(())
    }

    #[test]
    fn try_on_success_returns_data_uri() -> anyhow::Result<()> {
        let (stylist, _) = scripted_stylist(
            Ok(Vec::new()),
            Ok(vec![ResponsePart::Image(DataUri::new("image/webp", "RESULT"))]),
        )?;
        let reply = dispatch(
            &stylist,
            "/api/virtual-tryon",
            r#"{"avatar": {"base64": "QUJD", "mimeType": "image/jpeg"},
                "items": [{"base64": "QUJD", "mimeType": "image/png", "category": "shoes"}]}"#,
        );
        assert_eq!(reply.status, 200);
        assert_eq!(reply.body, json!({"image": "data:image/webp;base64,RESULT"}));
        Ok(())
    }

    #[test]
    fn try_on_without_avatar_is_400() -> anyhow::Result<()> {
        let (stylist, _) = scripted_stylist(Ok(Vec::new()), Ok(Vec::new()))?;
        let reply = dispatch(&stylist, "/api/virtual-tryon", r#"{"items": []}"#);
        assert_eq!(reply.status, 400);
        Ok(())
    }

    #[test]
    fn dispatch_rejects_bad_routes_and_bodies() -> anyhow::Result<()> {
        let (stylist, _) = scripted_stylist(Ok(Vec::new()), Ok(Vec::new()))?;
        assert_eq!(dispatch(&stylist, "/api/unknown", "{}").status, 404);
        assert_eq!(dispatch(&stylist, "/api/fashion-advice", "not json").status, 400);
        Ok(())
    }
}
