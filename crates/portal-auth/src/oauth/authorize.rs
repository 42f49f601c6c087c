//! Authorization endpoint.
//!
//! # OAuth 2.0 Authorization Code Flow
//!
//! 1. Client redirects the user here with request parameters
//! 2. The user logs in (if needed) and approves the requested scopes
//! 3. Server redirects back to the client with an authorization code
//! 4. Client exchanges the code at the token endpoint
//!
//! # Validation order
//!
//! `client_id` and `redirect_uri` are checked first. Until both are trusted,
//! failures are [`AuthorizeOutcome::Reject`]ed to the browser. After that every
//! protocol error becomes a redirect to the client carrying `error`,
//! `error_description` and `state`.
//!
//! Storage and signing failures are returned as `Err` at any stage.

use std::collections::BTreeSet;
use std::sync::Arc;

use time::Duration;
use url::form_urlencoded;

use crate::AuthResult;
use crate::error::AuthError;
use crate::oauth::params::RequestParams;
use crate::oauth::pkce::{PkceChallenge, PkceChallengeMethod};
use crate::oauth::prompt::Prompt;
use crate::oauth::redirect_uri::{self, with_params};
use crate::storage::{AuthorizationStorage, ClientStorage, ScopeStorage};
use crate::token::{JwtService, SidToken, TokenHandler};
use crate::types::{Client, OFFLINE_ACCESS, OPENID, Scope, join_scopes, parse_scope_param};

/// Path of the authorization endpoint.
pub const AUTHORIZE_PATH: &str = "/a/auth";

/// Path the consent form posts to.
pub const APPROVE_PATH: &str = "/a/auth/approve";

/// What the HTTP layer should do with an authorization request.
#[derive(Debug)]
pub enum AuthorizeOutcome {
    /// The client or redirect URI could not be trusted. Shown to the browser
    /// as a bare 400.
    Reject(AuthError),

    /// Redirect the browser (to the client, or to the login page).
    Redirect(String),

    /// Ask the user to approve the requested scopes.
    Consent(Box<ConsentPrompt>),
}

/// Everything the consent page shows and posts back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentPrompt {
    /// Client asking for access.
    pub client_id: String,
    /// Display name of the client.
    pub client_name: String,
    /// Validated redirect URI.
    pub redirect_uri: String,
    /// Client state, echoed back.
    pub state: Option<String>,
    /// OpenID Connect nonce, carried to the code.
    pub nonce: Option<String>,
    /// PKCE challenge, carried to the code.
    pub code_challenge: Option<String>,
    /// Every requested scope id.
    pub scope_ids: BTreeSet<String>,
    /// Requested scopes the user has not granted yet.
    pub missing_scopes: Vec<Scope>,
    /// Requested scopes the user may decline.
    pub optional_scopes: Vec<Scope>,
    /// Requested scopes the user granted before.
    pub authorized_scopes: Vec<Scope>,
    /// Where "deny" sends the browser.
    pub cancel_url: String,
}

/// Parameters that survive validation and end up on the code.
struct CodeRequest {
    scope_ids: BTreeSet<String>,
    nonce: Option<String>,
    code_challenge: Option<String>,
}

/// Runs the authorization endpoint and the consent approval.
#[derive(Clone)]
pub struct AuthorizationService {
    handler: TokenHandler,
    clients: Arc<dyn ClientStorage>,
    scopes: Arc<dyn ScopeStorage>,
    authorizations: Arc<dyn AuthorizationStorage>,
    jwt: Arc<JwtService>,
    login_url: String,
}

impl AuthorizationService {
    /// Creates the service.
    ///
    /// `login_url` is where unauthenticated users are sent; it receives
    /// `continue` and `cancel` query parameters.
    #[must_use]
    pub fn new(
        handler: TokenHandler,
        clients: Arc<dyn ClientStorage>,
        scopes: Arc<dyn ScopeStorage>,
        authorizations: Arc<dyn AuthorizationStorage>,
        jwt: Arc<JwtService>,
        login_url: impl Into<String>,
    ) -> Self {
        Self {
            handler,
            clients,
            scopes,
            authorizations,
            jwt,
            login_url: login_url.into(),
        }
    }

    /// Processes an authorization request for the current browser session.
    ///
    /// # Errors
    ///
    /// Returns an error only for storage and internal failures.
    pub async fn authorize(
        &self,
        params: &RequestParams,
        session: Option<&SidToken>,
    ) -> AuthResult<AuthorizeOutcome> {
        let (client, redirect_uri) = match self.trusted_client(params).await {
            Ok(trusted) => trusted,
            Err(e) => return reject(e),
        };
        let state = match params.optional_owned("state") {
            Ok(state) => state,
            Err(e) => return self.redirect_error(&redirect_uri, None, &e),
        };

        match self
            .process(params, &client, &redirect_uri, state.as_deref(), session)
            .await
        {
            Err(e) if !e.is_server_error() => {
                self.redirect_error(&redirect_uri, state.as_deref(), &e)
            }
            other => other,
        }
    }

    /// Processes a consent form submission.
    ///
    /// # Errors
    ///
    /// Returns an error only for storage and internal failures.
    pub async fn approve(
        &self,
        params: &RequestParams,
        session: Option<&SidToken>,
    ) -> AuthResult<AuthorizeOutcome> {
        let (client, redirect_uri) = match self.trusted_client(params).await {
            Ok(trusted) => trusted,
            Err(e) => return reject(e),
        };
        let state = match params.optional_owned("state") {
            Ok(state) => state,
            Err(e) => return self.redirect_error(&redirect_uri, None, &e),
        };

        match self
            .process_approval(params, &client, &redirect_uri, state.as_deref(), session)
            .await
        {
            Err(e) if !e.is_server_error() => {
                self.redirect_error(&redirect_uri, state.as_deref(), &e)
            }
            other => other,
        }
    }

    // =========================================================================
    // Steps
    // =========================================================================

    async fn trusted_client(&self, params: &RequestParams) -> AuthResult<(Client, String)> {
        let client_id = params.required("client_id")?;
        let client = match self.clients.find_by_client_id(client_id).await? {
            Some(client) if client.active => client,
            _ => {
                tracing::info!(client_id = %client_id, "Authorization request for unknown client");
                return Err(AuthError::access_denied("Unknown client"));
            }
        };

        let redirect_uri = params.required("redirect_uri")?;
        if !redirect_uri::is_valid(redirect_uri) || !client.is_redirect_uri_allowed(redirect_uri) {
            tracing::info!(client_id = %client_id, "Authorization request with unregistered redirect_uri");
            return Err(AuthError::invalid_request("Invalid redirect_uri"));
        }

        let redirect_uri = redirect_uri.to_string();
        Ok((client, redirect_uri))
    }

    async fn process(
        &self,
        params: &RequestParams,
        client: &Client,
        redirect_uri: &str,
        state: Option<&str>,
        session: Option<&SidToken>,
    ) -> AuthResult<AuthorizeOutcome> {
        let response_type = params.required("response_type")?;
        let response_mode = params.optional("response_mode")?;
        if response_type != "code" {
            return Err(AuthError::unsupported_response_type(response_type));
        }
        if let Some(mode) = response_mode.filter(|mode| *mode != "query") {
            return Err(AuthError::invalid_request(format!(
                "Unsupported response_mode: {mode}"
            )));
        }

        let mut scope_ids = parse_scope_param(params.required("scope")?);
        self.validate_scope_ids(&scope_ids).await?;

        if params.contains("request") {
            return Err(AuthError::RequestNotSupported);
        }
        if params.contains("request_uri") {
            return Err(AuthError::RequestUriNotSupported);
        }

        let prompt = Prompt::parse(params.optional("prompt")?)?;
        let sid = match session {
            Some(sid) if !prompt.login => sid,
            _ => return self.login_or_fail(params, prompt, redirect_uri, state),
        };

        if !prompt.consent {
            scope_ids.remove(OFFLINE_ACCESS);
        }

        if let Some(hint) = params.optional("id_token_hint")? {
            self.check_id_token_hint(hint, sid)?;
        }

        if let Some(max_age) = params.optional("max_age")? {
            let max_age = parse_max_age(max_age)?;
            let now = self.handler.clock().now();
            let fresh_until = sid
                .authentication_time
                .checked_add(Duration::seconds(max_age));
            if fresh_until.is_some_and(|until| until < now) {
                return self.login_or_fail(params, prompt, redirect_uri, state);
            }
        }

        let request = CodeRequest {
            scope_ids,
            nonce: params.optional_owned("nonce")?,
            code_challenge: code_challenge(params)?,
        };

        let authorized = self
            .authorizations
            .get_authorized_scopes(&sid.account_id, &client.client_id)
            .await?;
        if !prompt.consent && request.scope_ids.is_subset(&authorized) {
            tracing::debug!(client_id = %client.client_id, "Scopes already authorized");
            return self
                .issue_code(sid, &client.client_id, redirect_uri, state, request)
                .await
                .map(AuthorizeOutcome::Redirect);
        }

        if !prompt.interactive {
            return Err(AuthError::consent_required(
                "The user has not authorized all requested scopes",
            ));
        }

        let consent = self
            .consent_prompt(client, redirect_uri, state, request, &authorized)
            .await?;
        Ok(AuthorizeOutcome::Consent(Box::new(consent)))
    }

    async fn process_approval(
        &self,
        params: &RequestParams,
        client: &Client,
        redirect_uri: &str,
        state: Option<&str>,
        session: Option<&SidToken>,
    ) -> AuthResult<AuthorizeOutcome> {
        let Some(sid) = session else {
            return Err(AuthError::login_required("No active session"));
        };

        let scope_ids = parse_scope_param(params.required("scope")?);
        let selected: BTreeSet<String> = params
            .all("selected_scope")
            .flat_map(parse_scope_param)
            .collect();
        if !selected.contains(OPENID) || !selected.is_subset(&scope_ids) {
            return Err(AuthError::access_denied(
                "The user did not approve the request",
            ));
        }
        self.validate_scope_ids(&selected).await?;

        let request = CodeRequest {
            nonce: params.optional_owned("nonce")?,
            code_challenge: code_challenge(params)?,
            scope_ids: selected,
        };

        let mut recorded = request.scope_ids.clone();
        recorded.remove(OFFLINE_ACCESS);
        self.authorizations
            .authorize(&sid.account_id, &client.client_id, &recorded)
            .await?;
        tracing::info!(
            client_id = %client.client_id,
            account_id = %sid.account_id,
            scope = %join_scopes(&recorded),
            "Recorded consent"
        );

        self.issue_code(sid, &client.client_id, redirect_uri, state, request)
            .await
            .map(AuthorizeOutcome::Redirect)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Requires `openid` and rejects unknown scope ids.
    async fn validate_scope_ids(&self, scope_ids: &BTreeSet<String>) -> AuthResult<()> {
        if !scope_ids.contains(OPENID) {
            return Err(AuthError::invalid_scope("The openid scope is required"));
        }

        let registered: BTreeSet<String> = scope_ids
            .iter()
            .filter(|id| !is_builtin(id))
            .cloned()
            .collect();
        let found = self.scopes.find_by_ids(&registered).await?;
        if found.len() != registered.len() {
            let known: BTreeSet<&str> = found.iter().map(|s| s.id.as_str()).collect();
            let unknown: Vec<&str> = registered
                .iter()
                .map(String::as_str)
                .filter(|id| !known.contains(id))
                .collect();
            return Err(AuthError::invalid_scope(format!(
                "Unknown scope: {}",
                unknown.join(" ")
            )));
        }
        Ok(())
    }

    fn check_id_token_hint(&self, hint: &str, sid: &SidToken) -> AuthResult<()> {
        match self.jwt.verify_id_token_hint(hint) {
            Ok(hint) if hint.sub == sid.account_id => Ok(()),
            Ok(_) => Err(AuthError::login_required(
                "id_token_hint does not match the current session",
            )),
            Err(e) if e.is_validation_error() => {
                tracing::debug!(error = %e, "Rejected id_token_hint");
                Err(AuthError::invalid_request("Invalid id_token_hint"))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn login_or_fail(
        &self,
        params: &RequestParams,
        prompt: Prompt,
        redirect_uri: &str,
        state: Option<&str>,
    ) -> AuthResult<AuthorizeOutcome> {
        if !prompt.interactive {
            return Err(AuthError::login_required("The user must log in"));
        }

        let mut continue_params = form_urlencoded::Serializer::new(String::new());
        continue_params.extend_pairs(params.pairs_without(&["prompt"]));
        let prompt = prompt.without_login().to_string();
        if !prompt.is_empty() {
            continue_params.append_pair("prompt", &prompt);
        }
        let continue_url = format!("{AUTHORIZE_PATH}?{}", continue_params.finish());

        let cancel_url = self.redirect_url(
            redirect_uri,
            [("error", Some("login_required")), ("state", state)],
        )?;

        let mut login = form_urlencoded::Serializer::new(String::new());
        login.append_pair("continue", &continue_url);
        login.append_pair("cancel", &cancel_url);
        let separator = if self.login_url.contains('?') { '&' } else { '?' };
        Ok(AuthorizeOutcome::Redirect(format!(
            "{}{separator}{}",
            self.login_url,
            login.finish()
        )))
    }

    async fn consent_prompt(
        &self,
        client: &Client,
        redirect_uri: &str,
        state: Option<&str>,
        request: CodeRequest,
        authorized: &BTreeSet<String>,
    ) -> AuthResult<ConsentPrompt> {
        let registered: BTreeSet<String> = request
            .scope_ids
            .iter()
            .filter(|id| !is_builtin(id))
            .cloned()
            .collect();
        let mut scopes = self.scopes.find_by_ids(&registered).await?;
        scopes.extend(
            request
                .scope_ids
                .iter()
                .filter_map(|id| builtin_scope(id)),
        );
        scopes.sort_by(|a, b| a.id.cmp(&b.id));

        let mut missing_scopes = Vec::new();
        let mut optional_scopes = Vec::new();
        let mut authorized_scopes = Vec::new();
        for scope in scopes {
            if authorized.contains(&scope.id) {
                authorized_scopes.push(scope);
            } else if scope.id == OFFLINE_ACCESS {
                optional_scopes.push(scope);
            } else {
                missing_scopes.push(scope);
            }
        }

        let cancel_url = self.redirect_url(
            redirect_uri,
            [("error", Some("access_denied")), ("state", state)],
        )?;

        Ok(ConsentPrompt {
            client_id: client.client_id.clone(),
            client_name: client.name.clone(),
            redirect_uri: redirect_uri.to_string(),
            state: state.map(str::to_string),
            nonce: request.nonce,
            code_challenge: request.code_challenge,
            scope_ids: request.scope_ids,
            missing_scopes,
            optional_scopes,
            authorized_scopes,
            cancel_url,
        })
    }

    async fn issue_code(
        &self,
        sid: &SidToken,
        client_id: &str,
        redirect_uri: &str,
        state: Option<&str>,
        request: CodeRequest,
    ) -> AuthResult<String> {
        let code = self
            .handler
            .create_authorization_code(
                sid,
                request.scope_ids,
                client_id,
                request.nonce,
                redirect_uri,
                request.code_challenge,
                &self.handler.generate_pass(),
            )
            .await?;
        let serial = self.handler.serialize(&code.meta)?;

        self.redirect_url(
            redirect_uri,
            [("code", Some(serial.as_str())), ("state", state)],
        )
    }

    fn redirect_error(
        &self,
        redirect_uri: &str,
        state: Option<&str>,
        error: &AuthError,
    ) -> AuthResult<AuthorizeOutcome> {
        tracing::debug!(error = %error, "Redirecting authorization error to client");
        let description = error.public_description();
        self.redirect_url(
            redirect_uri,
            [
                ("error", Some(error.oauth_error_code())),
                ("error_description", description.as_deref()),
                ("state", state),
            ],
        )
        .map(AuthorizeOutcome::Redirect)
    }

    fn redirect_url<'a>(
        &self,
        redirect_uri: &str,
        params: impl IntoIterator<Item = (&'a str, Option<&'a str>)>,
    ) -> AuthResult<String> {
        with_params(redirect_uri, params)
            .map_err(|e| AuthError::internal(format!("Failed to build redirect: {e}")))
    }
}

fn reject(error: AuthError) -> AuthResult<AuthorizeOutcome> {
    if error.is_server_error() {
        Err(error)
    } else {
        Ok(AuthorizeOutcome::Reject(error))
    }
}

fn is_builtin(scope_id: &str) -> bool {
    scope_id == OPENID || scope_id == OFFLINE_ACCESS
}

fn builtin_scope(scope_id: &str) -> Option<Scope> {
    let name = match scope_id {
        OPENID => "Sign you in with your account",
        OFFLINE_ACCESS => "Keep access while you are not using the application",
        _ => return None,
    };
    Some(Scope {
        id: scope_id.to_string(),
        name: name.to_string(),
        description: None,
        data_provider_id: None,
    })
}

fn parse_max_age(value: &str) -> AuthResult<i64> {
    value
        .parse::<i64>()
        .ok()
        .filter(|max_age| *max_age >= 0)
        .ok_or_else(|| AuthError::invalid_request("max_age must be a non-negative integer"))
}

fn code_challenge(params: &RequestParams) -> AuthResult<Option<String>> {
    let Some(challenge) = params.optional("code_challenge")? else {
        return Ok(None);
    };
    let method = params.optional("code_challenge_method")?.ok_or_else(|| {
        AuthError::invalid_request("Missing required parameter: code_challenge_method")
    })?;
    PkceChallengeMethod::parse(method)?;
    Ok(Some(PkceChallenge::new(challenge.to_string())?.into_inner()))
}
