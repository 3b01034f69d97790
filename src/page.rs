/*
   Azure Entra ID SAML sign-in implementation
   Copyright (C) David Mulder <dmulder@samba.org> 2025

   This program is free software: you can redistribute it and/or modify
   it under the terms of the GNU Lesser General Public License as published by
   the Free Software Foundation, either version 3 of the License, or
   (at your option) any later version.

   This program is distributed in the hope that it will be useful,
   but WITHOUT ANY WARRANTY; without even the implied warranty of
   MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
   GNU Lesser General Public License for more details.

   You should have received a copy of the GNU Lesser General Public License
   along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use std::collections::HashMap;

use scraper::{Html, Selector};
use serde::de::DeserializeOwned;

use crate::error::AuthError;

const CONFIG_MARKER: &str = "$Config=";
const HIDDEN_FORM_PREFIX: &str = "<html><head><title>Working...</title>";

/// The kind of page AAD returned for one turn of the sign-in conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    SignIn,
    ProofUpRedirect,
    Kmsi,
    Tfa,
    SamlRequest,
    HiddenForm,
    Unknown,
}

/// Map a buffered response body to the page kind it represents.
///
/// First match wins. A ConvergedTFA body may also mention SAMLRequest in its
/// scripts, so the TFA marker is tested before the SAMLRequest one.
pub fn classify(body: &str) -> PageKind {
    if body.contains("ConvergedSignIn") {
        PageKind::SignIn
    } else if body.contains("ConvergedProofUpRedirect") {
        PageKind::ProofUpRedirect
    } else if body.contains("KmsiInterrupt") {
        PageKind::Kmsi
    } else if body.contains("ConvergedTFA") {
        PageKind::Tfa
    } else if body.contains("SAMLRequest") {
        PageKind::SamlRequest
    } else if is_hidden_form(body) {
        PageKind::HiddenForm
    } else {
        PageKind::Unknown
    }
}

fn is_hidden_form(body: &str) -> bool {
    body.starts_with(HIDDEN_FORM_PREFIX) && body.contains("name=\"hiddenform\"")
}

/// Pull the embedded `$Config=...` JSON value out of an AAD page body.
///
/// The config is embedded in a script element:
/// `<script><![CDATA[  $Config={...};  //]]></script>`
/// Everything after the marker is handed to a JSON decoder that stops at the
/// end of the first complete value, so the trailing script tail is ignored.
pub fn extract_config<T>(body: &str) -> Result<T, AuthError>
where
    T: DeserializeOwned,
{
    let start = body
        .find(CONFIG_MARKER)
        .ok_or_else(|| AuthError::MalformedConfig("$Config assignment not found".to_string()))?
        + CONFIG_MARKER.len();
    let mut de = serde_json::Deserializer::from_str(&body[start..]);
    T::deserialize(&mut de).map_err(|e| AuthError::MalformedConfig(format!("{}", e)))
}

/// Form fields and submit target recovered from an HTML body, ready for
/// re-submission.
pub struct FormData {
    pub fields: HashMap<String, String>,
    pub action: String,
}

/// Collect every named input value on the page, and the action of the last
/// form encountered.
pub fn resubmit_form_data(body: &str) -> Result<FormData, AuthError> {
    let document = Html::parse_document(body);
    let input_selector =
        Selector::parse("input").map_err(|e| AuthError::MalformedResponse(format!("{}", e)))?;
    let form_selector =
        Selector::parse("form").map_err(|e| AuthError::MalformedResponse(format!("{}", e)))?;

    let mut fields = HashMap::new();
    for input in document.select(&input_selector) {
        if let (Some(name), Some(value)) = (input.value().attr("name"), input.value().attr("value"))
        {
            fields.insert(name.to_string(), value.to_string());
        }
    }

    let action = document
        .select(&form_selector)
        .filter_map(|form| form.value().attr("action"))
        .last();

    match action {
        Some(action) if !action.is_empty() => Ok(FormData {
            fields,
            action: action.to_string(),
        }),
        _ => Err(AuthError::NoFormAction),
    }
}

/// The base64 SAML assertion carried by the hidden form, or an empty string
/// when the page has none.
pub fn saml_assertion(body: &str) -> Result<String, AuthError> {
    let document = Html::parse_document(body);
    let selector = Selector::parse(r#"input[name="SAMLResponse"]"#)
        .map_err(|e| AuthError::MalformedResponse(format!("{}", e)))?;

    Ok(document
        .select(&selector)
        .map(|input| input.value().attr("value").unwrap_or_default())
        .last()
        .unwrap_or_default()
        .to_string())
}

/// Recover the SAMLRequest target from an interstitial script page.
///
/// The URL is embedded as javascript:
/// `window.location = 'https://.../?SAMLRequest=...'`
/// The body is split on `;`; within a segment mentioning SAMLRequest the URL
/// runs from the first `https://` to the first `'`, falling back to the
/// first `"` only when no `'` exists at all.
pub fn saml_request_url(body: &str) -> Result<String, AuthError> {
    let mut target = None;
    for segment in body.split(';') {
        if !segment.contains("SAMLRequest") {
            continue;
        }
        let Some(start) = segment.find("https://") else {
            continue;
        };
        let tail = &segment[start..];
        if let Some(end) = tail.find('\'').or_else(|| tail.find('"')) {
            target = Some(tail[..end].to_string());
        }
    }
    target.ok_or(AuthError::NoSamlRequestUrl)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn classify_recognises_each_marker() {
        assert_eq!(classify("...ConvergedSignIn..."), PageKind::SignIn);
        assert_eq!(
            classify("...ConvergedProofUpRedirect..."),
            PageKind::ProofUpRedirect
        );
        assert_eq!(classify("...KmsiInterrupt..."), PageKind::Kmsi);
        assert_eq!(classify("...ConvergedTFA..."), PageKind::Tfa);
        assert_eq!(classify("...SAMLRequest..."), PageKind::SamlRequest);
        assert_eq!(classify("no markers at all"), PageKind::Unknown);
    }

    #[test]
    fn classify_prefers_tfa_over_saml_request() {
        let body = "window.location='https://x/?SAMLRequest=..'; ConvergedTFA";
        assert_eq!(classify(body), PageKind::Tfa);
    }

    #[test]
    fn classify_hidden_form_requires_working_prefix() {
        let body = format!(
            "{}</head><body><form name=\"hiddenform\"></form>",
            HIDDEN_FORM_PREFIX
        );
        assert_eq!(classify(&body), PageKind::HiddenForm);

        let no_prefix = "<html><body><form name=\"hiddenform\"></form>";
        assert_eq!(classify(no_prefix), PageKind::Unknown);

        let no_form = format!("{}</head><body>nothing here", HIDDEN_FORM_PREFIX);
        assert_eq!(classify(&no_form), PageKind::Unknown);
    }

    #[test]
    fn extract_config_ignores_trailing_script() {
        let body = "<script>//<![CDATA[\n$Config={\"sFT\":\"tok\",\"hpgact\":1800};\n//]]></script>";
        let config: serde_json::Value = extract_config(body).unwrap();
        assert_eq!(config["sFT"], "tok");
        assert_eq!(config["hpgact"], 1800);
    }

    #[test]
    fn extract_config_requires_marker() {
        let err = extract_config::<serde_json::Value>("<html>no config</html>").unwrap_err();
        assert!(matches!(err, AuthError::MalformedConfig(_)));
    }

    #[test]
    fn extract_config_rejects_bad_json() {
        let err = extract_config::<serde_json::Value>("$Config={not json;").unwrap_err();
        assert!(matches!(err, AuthError::MalformedConfig(_)));
    }

    #[test]
    fn resubmit_form_data_collects_inputs_and_last_action() {
        let body = r#"<html><body>
            <form action="/first"><input name="a" value="1"/></form>
            <form action="/second">
                <input name="a" value="2"/>
                <input name="b" value="3"/>
                <input name="novalue"/>
                <input value="noname"/>
            </form>
        </body></html>"#;
        let form = resubmit_form_data(body).unwrap();
        assert_eq!(form.action, "/second");
        assert_eq!(form.fields.get("a"), Some(&"2".to_string()));
        assert_eq!(form.fields.get("b"), Some(&"3".to_string()));
        assert!(!form.fields.contains_key("novalue"));
        assert_eq!(form.fields.len(), 2);
    }

    #[test]
    fn resubmit_form_data_without_action_fails() {
        let body = r#"<html><body><form><input name="a" value="1"/></form></body></html>"#;
        assert!(matches!(
            resubmit_form_data(body),
            Err(AuthError::NoFormAction)
        ));
    }

    #[test]
    fn saml_assertion_reads_hidden_input() {
        let body = r#"<html><body><form>
            <input type="hidden" name="SAMLResponse" value="QkFTRTY0"/>
        </form></body></html>"#;
        assert_eq!(saml_assertion(body).unwrap(), "QkFTRTY0");
    }

    #[test]
    fn saml_assertion_absent_is_empty() {
        let body = r#"<html><body><input name="other" value="x"/></body></html>"#;
        assert_eq!(saml_assertion(body).unwrap(), "");
    }

    #[test]
    fn saml_request_url_between_single_quotes() {
        let body = "a=1;window.location = 'https://login.example.com/saml?SAMLRequest=abc';b=2";
        assert_eq!(
            saml_request_url(body).unwrap(),
            "https://login.example.com/saml?SAMLRequest=abc"
        );
    }

    #[test]
    fn saml_request_url_falls_back_to_double_quotes() {
        let body = r#"window.location = "https://login.example.com/saml?SAMLRequest=abc""#;
        assert_eq!(
            saml_request_url(body).unwrap(),
            "https://login.example.com/saml?SAMLRequest=abc"
        );
    }

    // The single quote terminator wins even when a double quote appears
    // earlier in the segment.
    #[test]
    fn saml_request_url_prefers_single_quote_terminator() {
        let body = "x = https://h/saml?SAMLRequest=a\"b'c";
        assert_eq!(saml_request_url(body).unwrap(), "https://h/saml?SAMLRequest=a\"b");
    }

    #[test]
    fn saml_request_url_last_segment_wins() {
        let body = "u='https://first/?SAMLRequest=1';v='https://second/?SAMLRequest=2'";
        assert_eq!(saml_request_url(body).unwrap(), "https://second/?SAMLRequest=2");
    }

    #[test]
    fn saml_request_url_missing_fails() {
        assert!(matches!(
            saml_request_url("window.location = 'https://nothing.example.com'"),
            Err(AuthError::NoSamlRequestUrl)
        ));
    }
}
