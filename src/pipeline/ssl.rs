//! SSL upgrade and redirect policy.
//!
//! TLS is terminated by an external proxy; this stage only decides whether
//! a request that is still plain http should be redirected to its https
//! equivalent. Clients announcing `Upgrade-Insecure-Requests` get a 308 for
//! any method; otherwise only GET requests are redirected (301), so
//! state-changing request bodies are never silently dropped.

use crate::config::{HttpOptions, SslRedirectMode};
use crate::protocol::{Output, Request, RequestTag, SendError};

/// Applies the redirect policy. Returns `true` when a redirect response has
/// been formed and the pipeline must stop.
pub fn handle(options: &HttpOptions, request: &Request, output: &mut Output) -> Result<bool, SendError> {
    if request.scheme == "https" || options.ssl_redirect != SslRedirectMode::Auto {
        return Ok(false);
    }

    // when a scheme trust header is configured but recovery never ran, the
    // original scheme cannot be asserted safely
    if options.real_scheme_header.is_some() && !request.has_tag(RequestTag::OriginalScheme) {
        return Ok(false);
    }

    let location = format!("Location: https://{}{}", request.host, request.uri);

    if request.headers.get("upgrade-insecure-requests").map(str::trim) == Some("1") {
        output.set_status(308)?;
        output.header("Vary: Upgrade-Insecure-Requests")?;
        output.header(location)?;
        return Ok(true);
    }

    if request.method == "get" {
        output.set_status(301)?;
        output.header(location)?;
        return Ok(true);
    }

    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::HeaderStore;

    fn auto_options() -> HttpOptions {
        HttpOptions { ssl_redirect: SslRedirectMode::Auto, ..Default::default() }
    }

    fn plain_request(method: &str, headers: &[(&str, &str)]) -> Request {
        Request {
            method: method.to_owned(),
            host: "example.com".to_owned(),
            uri: "/app?x=1".to_owned(),
            headers: headers.iter().copied().collect::<HeaderStore>(),
            ..Default::default()
        }
    }

    fn output() -> Output {
        let (near, _far) = tokio::io::duplex(4096);
        Output::new(near)
    }

    #[test]
    fn get_over_http_is_redirected_301() {
        let request = plain_request("get", &[]);
        let mut output = output();

        assert!(handle(&auto_options(), &request, &mut output).unwrap());
        assert_eq!(output.status(), 301);
    }

    #[test]
    fn upgrade_willing_client_gets_308_for_any_method() {
        let request = plain_request("post", &[("upgrade-insecure-requests", "1")]);
        let mut output = output();

        assert!(handle(&auto_options(), &request, &mut output).unwrap());
        assert_eq!(output.status(), 308);
    }

    #[test]
    fn post_without_upgrade_hint_is_not_redirected() {
        let request = plain_request("post", &[]);
        let mut output = output();

        assert!(!handle(&auto_options(), &request, &mut output).unwrap());
        assert_eq!(output.status(), 200);
    }

    #[test]
    fn https_request_is_left_alone() {
        let mut request = plain_request("get", &[]);
        request.scheme = "https".to_owned();
        let mut output = output();

        assert!(!handle(&auto_options(), &request, &mut output).unwrap());
    }

    #[test]
    fn disabled_mode_is_a_noop() {
        let request = plain_request("get", &[]);
        let mut output = output();

        assert!(!handle(&HttpOptions::default(), &request, &mut output).unwrap());
    }

    #[test]
    fn skipped_without_trust_tag_when_scheme_header_configured() {
        let options = HttpOptions {
            ssl_redirect: SslRedirectMode::Auto,
            real_scheme_header: Some("X-Forwarded-Proto".to_owned()),
            ..Default::default()
        };
        let request = plain_request("get", &[]);
        let mut output = output();

        assert!(!handle(&options, &request, &mut output).unwrap());

        // with the trust tag present the redirect applies again
        let mut tagged = plain_request("get", &[]);
        tagged.set_tag(RequestTag::OriginalScheme, "http");
        let mut output = self::output();
        assert!(handle(&options, &tagged, &mut output).unwrap());
        assert_eq!(output.status(), 301);
    }
}
