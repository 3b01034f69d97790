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
use std::thread::sleep;
use std::time::Duration;

use reqwest::{header, Response, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info};
use url::Position;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::AuthError;
use crate::page::{self, PageKind};
use crate::prompt::{Prompter, StdPrompter};
use crate::session::HttpSession;

/// Sleep between EndAuth polls when the converged config carries no interval
/// for the active MFA method.
const DEFAULT_POLL_INTERVAL_SECS: f64 = 2.0;

/// Credentials for one authentication run.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct LoginDetails {
    pub username: String,
    pub password: String,
    /// Pre-supplied OTP; when set, OTP/SMS challenges are answered without
    /// prompting.
    pub mfa_token: Option<String>,
}

/// The AAD tenant and application the driver signs in to.
#[derive(Clone)]
pub struct IdpAccount {
    /// Tenant URL root, e.g. <https://account.activedirectory.windowsazure.com>
    pub url: String,
    /// Application id passed to the federated sign-in entry point
    pub app_id: String,
    /// "Auto" selects the proof AAD marks as default; any other value names
    /// an AuthMethodId
    pub mfa: String,
    /// Bypass TLS chain validation
    pub skip_verify: bool,
}

impl Default for IdpAccount {
    fn default() -> Self {
        IdpAccount {
            url: String::new(),
            app_id: String::new(),
            mfa: "Auto".to_string(),
            skip_verify: false,
        }
    }
}

/// The `$Config` blob AAD embeds in every converged page. Fields are
/// page-dependent; absent ones decode to empty values.
#[derive(Default, Deserialize)]
struct ConvergedConfig {
    #[serde(rename = "urlGetCredentialType", default)]
    url_get_credential_type: String,
    #[serde(rename = "arrUserProofs", default)]
    arr_user_proofs: Vec<UserProof>,
    #[serde(rename = "urlSkipMfaRegistration", default)]
    url_skip_mfa_registration: String,
    #[serde(rename = "oPerAuthPollingInterval", default)]
    per_auth_polling_interval: HashMap<String, f64>,
    #[serde(rename = "urlBeginAuth", default)]
    url_begin_auth: String,
    #[serde(rename = "urlEndAuth", default)]
    url_end_auth: String,
    #[serde(rename = "urlPost", default)]
    url_post: String,
    #[serde(rename = "sErrorCode", default)]
    error_code: String,
    #[serde(rename = "sErrTxt", default)]
    err_txt: String,
    #[serde(rename = "sPOST_Username", default)]
    post_username: String,
    #[serde(rename = "sFT", default)]
    sft: String,
    #[serde(rename = "sFTName", default)]
    sft_name: String,
    #[serde(rename = "sCtx", default)]
    sctx: String,
    #[serde(default)]
    hpgact: i64,
    #[serde(default)]
    hpgid: i64,
    #[serde(default)]
    pgid: String,
    #[serde(rename = "apiCanary", default)]
    api_canary: String,
    #[serde(default)]
    canary: String,
    #[serde(rename = "correlationId", default)]
    correlation_id: String,
    #[serde(rename = "sessionId", default)]
    session_id: String,
}

/// One method by which the user can prove their identity.
#[derive(Clone, Default, Deserialize)]
struct UserProof {
    #[serde(rename = "authMethodId", default)]
    auth_method_id: String,
    #[serde(default)]
    display: String,
    #[serde(rename = "isDefault", default)]
    is_default: bool,
}

#[derive(Serialize)]
struct GetCredentialTypeRequest<'a> {
    username: &'a str,
    #[serde(rename = "isOtherIdpSupported")]
    is_other_idp_supported: bool,
    #[serde(rename = "checkPhones")]
    check_phones: bool,
    #[serde(rename = "isRemoteNGCSupported")]
    is_remote_ngc_supported: bool,
    #[serde(rename = "isCookieBannerShown")]
    is_cookie_banner_shown: bool,
    #[serde(rename = "isFidoSupported")]
    is_fido_supported: bool,
    #[serde(rename = "originalRequest")]
    original_request: &'a str,
    country: &'a str,
    forceotclogin: bool,
    #[serde(rename = "isExternalFederationDisallowed")]
    is_external_federation_disallowed: bool,
    #[serde(rename = "isRemoteConnectSupported")]
    is_remote_connect_supported: bool,
    #[serde(rename = "federationFlags")]
    federation_flags: i64,
    #[serde(rename = "isSignup")]
    is_signup: bool,
    #[serde(rename = "flowToken")]
    flow_token: &'a str,
    #[serde(rename = "isAccessPassSupported")]
    is_access_pass_supported: bool,
}

#[derive(Default, Deserialize)]
struct GetCredentialTypeResponse {
    #[serde(rename = "IfExistsResult", default)]
    if_exists_result: i64,
    #[serde(rename = "Credentials", default)]
    credentials: CredentialDetails,
}

#[derive(Default, Deserialize)]
struct CredentialDetails {
    #[serde(rename = "HasPassword", default)]
    has_password: bool,
    #[serde(rename = "FederationRedirectUrl", default)]
    federation_redirect_url: String,
}

#[derive(Serialize)]
struct MfaRequest {
    #[serde(rename = "AuthMethodId")]
    auth_method_id: String,
    #[serde(rename = "Method")]
    method: &'static str,
    #[serde(rename = "Ctx")]
    ctx: String,
    #[serde(rename = "FlowToken")]
    flow_token: String,
    #[serde(rename = "SessionId", skip_serializing_if = "String::is_empty")]
    session_id: String,
    #[serde(rename = "AdditionalAuthData", skip_serializing_if = "String::is_empty")]
    additional_auth_data: String,
}

#[derive(Default, Deserialize)]
struct MfaResponse {
    #[serde(rename = "Success", default)]
    success: bool,
    #[serde(rename = "Message", default)]
    message: Value,
    #[serde(rename = "AuthMethodId", default)]
    auth_method_id: String,
    #[serde(rename = "ErrCode", default)]
    err_code: i64,
    #[serde(rename = "Retry", default)]
    retry: bool,
    #[serde(rename = "FlowToken", default)]
    flow_token: String,
    #[serde(rename = "Ctx", default)]
    ctx: String,
    #[serde(rename = "SessionId", default)]
    session_id: String,
    #[serde(rename = "Entropy", default)]
    entropy: i64,
}

/// Client wrapper around AzureAD enabling authentication and retrieval of
/// SAML assertions.
pub struct Client {
    session: HttpSession,
    idp_account: IdpAccount,
    prompter: Box<dyn Prompter + Send + Sync>,
}

impl Client {
    /// Create a new AzureAD client for the given account, prompting for MFA
    /// verification codes on stdin.
    pub fn new(idp_account: IdpAccount) -> Result<Self, AuthError> {
        Self::with_prompter(idp_account, Box::new(StdPrompter))
    }

    /// Create a client with a custom prompter.
    pub fn with_prompter(
        idp_account: IdpAccount,
        prompter: Box<dyn Prompter + Send + Sync>,
    ) -> Result<Self, AuthError> {
        Ok(Client {
            session: HttpSession::new(idp_account.skip_verify)?,
            idp_account,
            prompter,
        })
    }

    /// Authenticate to AzureAD and return the base64 data from the body of
    /// the SAML assertion.
    pub async fn authenticate(&self, login_details: &LoginDetails) -> Result<String, AuthError> {
        let start_url = format!(
            "{}/applications/redirecttofederatedapplication.aspx?Operation=LinkedSignIn&applicationId={}",
            self.idp_account.url, self.idp_account.app_id
        );

        let mut res = self.session.get(&start_url).await?;

        loop {
            // Buffer the body once per turn; the classified handler reads the
            // same bytes the classifier saw.
            let page_url = res.url().clone();
            let body = res
                .text()
                .await
                .map_err(|e| AuthError::Transport(format!("{}", e)))?;

            match page::classify(&body) {
                PageKind::SignIn => {
                    debug!("processing ConvergedSignIn");
                    res = self
                        .process_converged_sign_in(&page_url, &body, login_details)
                        .await?;
                }
                PageKind::ProofUpRedirect => {
                    debug!("processing ConvergedProofUpRedirect");
                    res = self.process_proof_up_redirect(&body).await?;
                }
                PageKind::Kmsi => {
                    debug!("processing KmsiInterrupt");
                    res = self.process_kmsi_interrupt(&page_url, &body).await?;
                }
                PageKind::Tfa => {
                    debug!("processing ConvergedTFA");
                    res = self.process_converged_tfa(&body, login_details).await?;
                }
                PageKind::SamlRequest => {
                    debug!("processing SAMLRequest");
                    res = self.process_saml_request(&body).await?;
                }
                PageKind::HiddenForm => {
                    let assertion = page::saml_assertion(&body)?;
                    if !assertion.is_empty() {
                        debug!("processing a SAMLResponse");
                        return Ok(assertion);
                    }
                    debug!("processing a 'hiddenform'");
                    res = self.reprocess_form(&body).await?;
                }
                PageKind::Unknown => {
                    if let Ok(config) = page::extract_config::<ConvergedConfig>(&body) {
                        debug!("unknown process step found: {}", config.pgid);
                        return Err(AuthError::UnknownPage(config.pgid));
                    }
                    debug!("reached an unknown page within the authentication process");
                    break;
                }
            }
        }

        Err(AuthError::AssertionNotFound)
    }

    async fn process_converged_sign_in(
        &self,
        page_url: &Url,
        body: &str,
        login_details: &LoginDetails,
    ) -> Result<Response, AuthError> {
        let config: ConvergedConfig = page::extract_config(body)?;

        let login_request_url = resolve_url(page_url, &config.url_post);
        let referer = page_url.as_str();

        let cred_type = self
            .request_get_credential_type(referer, login_details, &config)
            .await?;
        debug!(
            "credential type: IfExistsResult={} HasPassword={}",
            cred_type.if_exists_result, cred_type.credentials.has_password
        );

        if !cred_type.credentials.federation_redirect_url.is_empty() {
            self.process_adfs_authentication(
                &cred_type.credentials.federation_redirect_url,
                login_details,
            )
            .await
        } else {
            self.process_authentication(&login_request_url, referer, login_details, &config)
                .await
        }
    }

    async fn request_get_credential_type(
        &self,
        referer: &str,
        login_details: &LoginDetails,
        config: &ConvergedConfig,
    ) -> Result<GetCredentialTypeResponse, AuthError> {
        let request = GetCredentialTypeRequest {
            username: &login_details.username,
            is_other_idp_supported: true,
            check_phones: false,
            is_remote_ngc_supported: false,
            is_cookie_banner_shown: false,
            is_fido_supported: false,
            original_request: &config.sctx,
            country: "",
            forceotclogin: false,
            is_external_federation_disallowed: false,
            is_remote_connect_supported: false,
            federation_flags: 0,
            is_signup: false,
            flow_token: &config.sft,
            is_access_pass_supported: false,
        };

        let res = self
            .session
            .client()
            .post(&config.url_get_credential_type)
            .header("canary", &config.api_canary)
            .header("client-request-id", &config.correlation_id)
            .header("hpgact", config.hpgact.to_string())
            .header("hpgid", config.hpgid.to_string())
            .header("hpgrequestid", &config.session_id)
            .header(header::REFERER, referer)
            .json(&request)
            .send()
            .await
            .map_err(|e| AuthError::Transport(format!("{}", e)))?;

        res.json()
            .await
            .map_err(|e| AuthError::MalformedResponse(format!("GetCredentialType: {}", e)))
    }

    async fn process_adfs_authentication(
        &self,
        federation_url: &str,
        login_details: &LoginDetails,
    ) -> Result<Response, AuthError> {
        let res = self.session.get(federation_url).await?;
        let adfs_url = res.url().clone();
        let body = res
            .text()
            .await
            .map_err(|e| AuthError::Transport(format!("{}", e)))?;

        let mut form = page::resubmit_form_data(&body)?;
        form.fields
            .insert("UserName".to_string(), login_details.username.clone());
        form.fields
            .insert("Password".to_string(), login_details.password.clone());
        form.fields
            .insert("AuthMethod".to_string(), "FormsAuthentication".to_string());

        self.session
            .client()
            .post(resolve_url(&adfs_url, &form.action))
            .form(&form.fields)
            .send()
            .await
            .map_err(|e| AuthError::Transport(format!("{}", e)))
    }

    async fn process_authentication(
        &self,
        login_url: &str,
        referer: &str,
        login_details: &LoginDetails,
        config: &ConvergedConfig,
    ) -> Result<Response, AuthError> {
        // 50058: user is not signed in (yet)
        if !config.error_code.is_empty() && config.error_code != "50058" {
            if !config.err_txt.is_empty() {
                error!("{}", config.err_txt);
            }
            return Err(AuthError::LoginError(config.error_code.clone()));
        }

        let form = [
            ("canary", config.canary.as_str()),
            ("hpgrequestid", config.session_id.as_str()),
            (config.sft_name.as_str(), config.sft.as_str()),
            ("ctx", config.sctx.as_str()),
            ("login", login_details.username.as_str()),
            ("loginfmt", login_details.username.as_str()),
            ("passwd", login_details.password.as_str()),
        ];

        self.session
            .client()
            .post(login_url)
            .header(header::REFERER, referer)
            .form(&form)
            .send()
            .await
            .map_err(|e| AuthError::Transport(format!("{}", e)))
    }

    async fn process_kmsi_interrupt(
        &self,
        page_url: &Url,
        body: &str,
    ) -> Result<Response, AuthError> {
        let config: ConvergedConfig = page::extract_config(body)?;

        let form = [
            (config.sft_name.as_str(), config.sft.as_str()),
            ("ctx", config.sctx.as_str()),
            ("LoginOptions", "1"),
        ];

        // The 302 this POST earns carries the SAMLResponse hand-off in its
        // Location; it must be observed, not chased.
        let _redirects = self.session.redirects_disabled();
        self.session
            .client()
            .post(resolve_url(page_url, &config.url_post))
            .form(&form)
            .send()
            .await
            .map_err(|e| AuthError::Transport(format!("{}", e)))
    }

    async fn process_converged_tfa(
        &self,
        body: &str,
        login_details: &LoginDetails,
    ) -> Result<Response, AuthError> {
        let config: ConvergedConfig = page::extract_config(body)?;

        if !config.url_skip_mfa_registration.is_empty() {
            // an explicit option to skip MFA is offered, take it
            self.session.get(&config.url_skip_mfa_registration).await
        } else if !config.arr_user_proofs.is_empty() {
            self.process_mfa(&config, login_details).await
        } else {
            Err(AuthError::UnknownPage("ConvergedTFA".to_string()))
        }
    }

    async fn process_mfa(
        &self,
        config: &ConvergedConfig,
        login_details: &LoginDetails,
    ) -> Result<Response, AuthError> {
        let Some(proof) = select_proof(&config.arr_user_proofs, &self.idp_account.mfa) else {
            return Err(AuthError::MfaBeginFailed("no MFA methods offered".to_string()));
        };
        debug!(
            "selected MFA method {} ({})",
            proof.auth_method_id, proof.display
        );

        let mut mfa = self.process_mfa_begin_auth(proof, config).await?;

        let mut i = 0u32;
        loop {
            let mut request = MfaRequest {
                auth_method_id: mfa.auth_method_id.clone(),
                method: "EndAuth",
                ctx: mfa.ctx.clone(),
                flow_token: mfa.flow_token.clone(),
                session_id: mfa.session_id.clone(),
                additional_auth_data: String::new(),
            };

            if request.auth_method_id == "PhoneAppOTP" || request.auth_method_id == "OneWaySMS" {
                request.additional_auth_data = match &login_details.mfa_token {
                    Some(token) if !token.is_empty() => token.clone(),
                    _ => self.prompter.string_required("Enter verification code"),
                };
            }
            if request.auth_method_id == "PhoneAppNotification" && i == 0 {
                if mfa.entropy == 0 {
                    info!("Phone approval required.");
                } else {
                    info!("Phone approval required. Entropy is: {}", mfa.entropy);
                }
            }

            mfa = self.process_mfa_end_auth(&request, config).await?;

            if mfa.err_code != 0 {
                return Err(AuthError::MfaFailed(mfa.err_code, message_text(&mfa.message)));
            }
            if mfa.success {
                break;
            }
            if !mfa.retry {
                break;
            }

            sleep(Duration::from_secs_f64(poll_interval(
                config,
                &mfa.auth_method_id,
            )));
            i += 1;
        }

        if !mfa.success {
            return Err(AuthError::MfaNotSuccessful);
        }

        self.process_mfa_auth(&mfa, config).await
    }

    async fn process_mfa_begin_auth(
        &self,
        proof: &UserProof,
        config: &ConvergedConfig,
    ) -> Result<MfaResponse, AuthError> {
        let request = MfaRequest {
            auth_method_id: proof.auth_method_id.clone(),
            method: "BeginAuth",
            ctx: config.sctx.clone(),
            flow_token: config.sft.clone(),
            session_id: String::new(),
            additional_auth_data: String::new(),
        };

        let mfa: MfaResponse = self
            .session
            .client()
            .post(&config.url_begin_auth)
            .json(&request)
            .send()
            .await
            .map_err(|e| AuthError::Transport(format!("{}", e)))?
            .json()
            .await
            .map_err(|e| AuthError::MalformedResponse(format!("BeginAuth: {}", e)))?;

        if !mfa.success {
            return Err(AuthError::MfaBeginFailed(message_text(&mfa.message)));
        }

        Ok(mfa)
    }

    async fn process_mfa_end_auth(
        &self,
        request: &MfaRequest,
        config: &ConvergedConfig,
    ) -> Result<MfaResponse, AuthError> {
        self.session
            .client()
            .post(&config.url_end_auth)
            .json(request)
            .send()
            .await
            .map_err(|e| AuthError::Transport(format!("{}", e)))?
            .json()
            .await
            .map_err(|e| AuthError::MalformedResponse(format!("EndAuth: {}", e)))
    }

    async fn process_mfa_auth(
        &self,
        mfa: &MfaResponse,
        config: &ConvergedConfig,
    ) -> Result<Response, AuthError> {
        let form = [
            (config.sft_name.as_str(), mfa.flow_token.as_str()),
            ("request", mfa.ctx.as_str()),
            ("login", config.post_username.as_str()),
        ];

        self.session
            .client()
            .post(&config.url_post)
            .form(&form)
            .send()
            .await
            .map_err(|e| AuthError::Transport(format!("{}", e)))
    }

    async fn process_saml_request(&self, body: &str) -> Result<Response, AuthError> {
        let url = page::saml_request_url(body)?;
        self.session.get(&url).await
    }

    async fn process_proof_up_redirect(&self, body: &str) -> Result<Response, AuthError> {
        let config: ConvergedConfig = page::extract_config(body)?;

        // 50058: user is not signed in (yet)
        if !config.error_code.is_empty() && config.error_code != "50058" {
            return Err(AuthError::LoginError(config.error_code.clone()));
        }

        if config.url_skip_mfa_registration.is_empty() {
            return Err(AuthError::SkipMfaNotPossible);
        }

        self.session.get(&config.url_skip_mfa_registration).await
    }

    async fn reprocess_form(&self, body: &str) -> Result<Response, AuthError> {
        let form = page::resubmit_form_data(body)?;

        self.session
            .client()
            .post(&form.action)
            .form(&form.fields)
            .send()
            .await
            .map_err(|e| AuthError::Transport(format!("{}", e)))
    }
}

/// Pick the proof to challenge. "Auto" takes the first default; a named
/// method takes the first exact AuthMethodId match. Either way the first
/// offered proof is the fallback.
fn select_proof<'a>(proofs: &'a [UserProof], preferred: &str) -> Option<&'a UserProof> {
    let fallback = proofs.first()?;
    let selected = match preferred {
        "Auto" => proofs.iter().find(|proof| proof.is_default),
        _ => proofs.iter().find(|proof| proof.auth_method_id == preferred),
    };
    Some(selected.unwrap_or(fallback))
}

fn poll_interval(config: &ConvergedConfig, auth_method_id: &str) -> f64 {
    match config.per_auth_polling_interval.get(auth_method_id) {
        Some(secs) => *secs,
        None => DEFAULT_POLL_INTERVAL_SECS,
    }
}

fn message_text(message: &Value) -> String {
    match message {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn resolve_url(page_url: &Url, fragment: &str) -> String {
    match fragment.starts_with('/') {
        true => format!("{}{}", &page_url[..Position::BeforePath], fragment),
        false => fragment.to_string(),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn proof(auth_method_id: &str, is_default: bool) -> UserProof {
        UserProof {
            auth_method_id: auth_method_id.to_string(),
            display: String::new(),
            is_default,
        }
    }

    #[test]
    fn select_proof_auto_prefers_default() {
        let proofs = vec![
            proof("OneWaySMS", false),
            proof("PhoneAppNotification", true),
        ];
        let selected = select_proof(&proofs, "Auto").unwrap();
        assert_eq!(selected.auth_method_id, "PhoneAppNotification");
    }

    #[test]
    fn select_proof_auto_without_default_takes_first() {
        let proofs = vec![proof("OneWaySMS", false), proof("PhoneAppOTP", false)];
        let selected = select_proof(&proofs, "Auto").unwrap();
        assert_eq!(selected.auth_method_id, "OneWaySMS");
    }

    #[test]
    fn select_proof_by_name() {
        let proofs = vec![
            proof("OneWaySMS", true),
            proof("PhoneAppOTP", false),
        ];
        let selected = select_proof(&proofs, "PhoneAppOTP").unwrap();
        assert_eq!(selected.auth_method_id, "PhoneAppOTP");
    }

    #[test]
    fn select_proof_unknown_name_falls_back_to_first() {
        let proofs = vec![proof("OneWaySMS", false), proof("PhoneAppOTP", true)];
        let selected = select_proof(&proofs, "FidoKey").unwrap();
        assert_eq!(selected.auth_method_id, "OneWaySMS");
    }

    #[test]
    fn select_proof_empty_is_none() {
        assert!(select_proof(&[], "Auto").is_none());
    }

    #[test]
    fn poll_interval_uses_config_value() {
        let mut config = ConvergedConfig::default();
        config
            .per_auth_polling_interval
            .insert("PhoneAppNotification".to_string(), 5.0);
        assert_eq!(poll_interval(&config, "PhoneAppNotification"), 5.0);
    }

    #[test]
    fn poll_interval_missing_method_gets_floor() {
        let config = ConvergedConfig::default();
        assert_eq!(
            poll_interval(&config, "PhoneAppNotification"),
            DEFAULT_POLL_INTERVAL_SECS
        );
    }

    #[test]
    fn converged_config_round_trips_consumed_fields() {
        let body = concat!(
            "<script>//<![CDATA[\n$Config=",
            r#"{"pgid":"ConvergedSignIn","sFT":"tok1","sFTName":"flowToken","sCtx":"ctx1",
                "canary":"c1","apiCanary":"api1","correlationId":"corr1","sessionId":"sess1",
                "hpgact":1800,"hpgid":1104,"urlPost":"/common/login",
                "urlGetCredentialType":"https://host/common/GetCredentialType",
                "urlBeginAuth":"https://host/common/SAS/BeginAuth",
                "urlEndAuth":"https://host/common/SAS/EndAuth",
                "sPOST_Username":"user@example.com","sErrorCode":"","sErrTxt":"",
                "arrUserProofs":[{"authMethodId":"PhoneAppOTP","display":"app","isDefault":true}],
                "oPerAuthPollingInterval":{"PhoneAppNotification":5.0},
                "urlSkipMfaRegistration":""}"#,
            ";\n//]]></script>"
        );
        let config: ConvergedConfig = page::extract_config(body).unwrap();
        assert_eq!(config.pgid, "ConvergedSignIn");
        assert_eq!(config.sft, "tok1");
        assert_eq!(config.sft_name, "flowToken");
        assert_eq!(config.sctx, "ctx1");
        assert_eq!(config.canary, "c1");
        assert_eq!(config.api_canary, "api1");
        assert_eq!(config.correlation_id, "corr1");
        assert_eq!(config.session_id, "sess1");
        assert_eq!(config.hpgact, 1800);
        assert_eq!(config.hpgid, 1104);
        assert_eq!(config.url_post, "/common/login");
        assert_eq!(config.post_username, "user@example.com");
        assert_eq!(config.arr_user_proofs.len(), 1);
        assert!(config.arr_user_proofs[0].is_default);
        assert_eq!(
            config.per_auth_polling_interval.get("PhoneAppNotification"),
            Some(&5.0)
        );
        assert!(config.error_code.is_empty());
        assert!(config.url_skip_mfa_registration.is_empty());
    }

    #[test]
    fn mfa_request_omits_empty_optional_fields() {
        let request = MfaRequest {
            auth_method_id: "PhoneAppNotification".to_string(),
            method: "BeginAuth",
            ctx: "c0".to_string(),
            flow_token: "f0".to_string(),
            session_id: String::new(),
            additional_auth_data: String::new(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["AuthMethodId"], "PhoneAppNotification");
        assert_eq!(json["Method"], "BeginAuth");
        assert!(json.get("SessionId").is_none());
        assert!(json.get("AdditionalAuthData").is_none());
    }

    #[test]
    fn message_text_renders_string_and_json() {
        assert_eq!(message_text(&Value::String("denied".to_string())), "denied");
        assert_eq!(message_text(&Value::Null), "null");
        assert_eq!(message_text(&serde_json::json!(9001)), "9001");
    }

    #[test]
    fn resolve_url_prefixes_rooted_fragments() {
        let page_url = Url::parse("https://login.microsoftonline.com/common/oauth2?x=1").unwrap();
        assert_eq!(
            resolve_url(&page_url, "/common/login"),
            "https://login.microsoftonline.com/common/login"
        );
        assert_eq!(
            resolve_url(&page_url, "https://other.example.com/login"),
            "https://other.example.com/login"
        );
    }
}
