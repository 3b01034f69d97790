use std::fmt;

#[derive(Debug)]
pub enum AuthError {
    /// Network or TLS failure in the underlying HTTP session
    Transport(String),
    /// The embedded $Config assignment was absent or its JSON prefix unparseable
    MalformedConfig(String),
    /// A response body or JSON envelope did not match the expected shape
    MalformedResponse(String),
    /// AAD reported a fatal sign-in error code
    LoginError(String),
    /// A page that should carry a re-submittable form had no form action
    NoFormAction,
    /// The SAMLRequest relay page carried no target URL
    NoSamlRequestUrl,
    /// MFA registration was demanded and the page offered no way to skip it
    SkipMfaNotPossible,
    /// The BeginAuth turn was rejected by the server
    MfaBeginFailed(String),
    /// The EndAuth turn reported a server-side error code
    MfaFailed(i64, String),
    /// The MFA poll loop finished without the server signalling success
    MfaNotSuccessful,
    /// The flow reached a sign-in page this driver does not recognise
    UnknownPage(String),
    /// The flow terminated without yielding a SAML assertion
    AssertionNotFound,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::Transport(e) => write!(f, "transport error: {}", e),
            AuthError::MalformedConfig(e) => write!(f, "malformed embedded config: {}", e),
            AuthError::MalformedResponse(e) => write!(f, "malformed response: {}", e),
            AuthError::LoginError(code) => write!(f, "login error {}", code),
            AuthError::NoFormAction => write!(f, "unable to locate form submit URL"),
            AuthError::NoSamlRequestUrl => write!(f, "unable to locate SAMLRequest URL"),
            AuthError::SkipMfaNotPossible => write!(f, "skip MFA not possible"),
            AuthError::MfaBeginFailed(msg) => {
                write!(f, "MFA BeginAuth result is not success: {}", msg)
            }
            AuthError::MfaFailed(code, msg) => {
                write!(f, "error processing MFA, errcode: {}, message: {}", code, msg)
            }
            AuthError::MfaNotSuccessful => write!(f, "error processing MFA"),
            AuthError::UnknownPage(pgid) => write!(f, "unknown sign-in page: {}", pgid),
            AuthError::AssertionNotFound => write!(f, "failed to get SAML assertion"),
        }
    }
}

impl std::error::Error for AuthError {}
