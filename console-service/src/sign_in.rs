use axum::extract::rejection::FormRejection;
use axum::extract::{Form, State};
use axum::http::{header::CONTENT_TYPE, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum_extra::extract::cookie::CookieJar;
use common_auth::{SessionCredential, SignInIdentity};
use tracing::{info, warn};

use crate::AppState;

const ID_TOKEN_FIELD: &str = "idtoken";

/// Login page wired to Google Sign-In for this client.
pub async fn root_page(State(state): State<AppState>) -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="google-signin-client_id" content="{audience}" />
    <title>Server console</title>
    <script src="https://apis.google.com/js/platform.js" async defer></script>
  </head>
  <body>
    <div class="g-signin2" data-onsuccess="onSignIn"></div>
    <script>
      function onSignIn(googleUser) {{
        const xhr = new XMLHttpRequest();
        xhr.open("POST", "/tokensignin");
        xhr.setRequestHeader("Content-Type", "application/x-www-form-urlencoded");
        xhr.send("idtoken=" + encodeURIComponent(googleUser.getAuthResponse().id_token));
      }}
    </script>
  </body>
</html>
"#,
        audience = state.audience()
    ))
}

/// Verifies a freshly obtained ID token and hands it back as a cookie.
///
/// Tokens without a verified, non-empty email end the request with an empty
/// 200 and no cookie; the caller is not told which claim was missing.
pub async fn token_sign_in(
    State(state): State<AppState>,
    form: Result<Form<Vec<(String, String)>>, FormRejection>,
) -> Response {
    let fields = match form {
        Ok(Form(fields)) => fields,
        Err(rejection) => {
            warn!(error = %rejection, "could not parse sign-in form");
            return bad_request();
        }
    };
    let id_token = match single_id_token(fields) {
        Ok(value) => value,
        Err(reason) => {
            warn!(reason, "rejecting sign-in form");
            return bad_request();
        }
    };

    let verified = match state.verifier.verify(&id_token).await {
        Ok(verified) => verified,
        Err(err) => {
            warn!(error = %err, "could not verify integrity of the ID token");
            state.metrics.verification_failed(&err);
            return bad_request();
        }
    };
    state.metrics.verification("verified");

    let Some(identity) = SignInIdentity::from_claims(&verified.claims) else {
        info!(subject = %verified.subject, "sign-in ended without a verified email");
        return StatusCode::OK.into_response();
    };

    info!(subject = %identity.subject, email = %identity.email, "issuing session credential");
    let jar = CookieJar::new().add(SessionCredential::issue(id_token).into_cookie());
    (jar, [(CONTENT_TYPE, "text/plain")], identity.email).into_response()
}

fn bad_request() -> Response {
    let status = StatusCode::BAD_REQUEST;
    (status, status.canonical_reason().unwrap_or("Bad Request")).into_response()
}

/// Exactly one `idtoken` among the submitted fields.
fn single_id_token(fields: Vec<(String, String)>) -> Result<String, &'static str> {
    let mut values = fields
        .into_iter()
        .filter(|(name, _)| name == ID_TOKEN_FIELD)
        .map(|(_, value)| value);

    match (values.next(), values.next()) {
        (Some(value), None) => Ok(value),
        (None, _) => Err("no 'idtoken' in form"),
        (Some(_), Some(_)) => Err("idtoken appears more than once in form"),
    }
}
