//! Management Portal links for model elements.

use crate::ServerSpec;

pub const HOME_PAGE: &str = "/csp/sys/UtilHome.csp";
pub const ECP_DATA_SERVERS_PAGE: &str = "/csp/sys/mgr/%25CSP.UI.Portal.ECPDataServers.zen";
pub const REMOTE_DATABASES_PAGE: &str = "/csp/sys/mgr/%25CSP.UI.Portal.RemoteDatabases.zen";
pub const DATABASE_DETAILS_PAGE: &str = "/csp/sys/op/%25CSP.UI.Portal.DatabaseDetails.zen";
pub const GLOBAL_LIST_PAGE: &str = "/csp/sys/exp/%25CSP.UI.Portal.GlobalList.zen";

/// `<scheme>://<host>:<port><pathPrefix><page>?<query>`, or `None` when the
/// server has no web front end configured.
pub fn portal_url(spec: &ServerSpec, page: &str, query: &str) -> Option<String> {
    let web = spec.web_server.as_ref()?;
    Some(format!(
        "{}://{}:{}{}{}?{}",
        web.scheme, web.host, web.port, web.path_prefix, page, query
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WebServer;

    #[test]
    fn builds_url_from_web_server() {
        let mut spec = ServerSpec::named("iris");
        spec.web_server = Some(WebServer {
            scheme: "https".to_string(),
            host: "iris.example.com".to_string(),
            port: 443,
            path_prefix: "/iris".to_string(),
        });
        assert_eq!(
            portal_url(&spec, GLOBAL_LIST_PAGE, "$NAMESPACE=USER").as_deref(),
            Some("https://iris.example.com:443/iris/csp/sys/exp/%25CSP.UI.Portal.GlobalList.zen?$NAMESPACE=USER")
        );
        assert_eq!(
            portal_url(&spec, HOME_PAGE, "").as_deref(),
            Some("https://iris.example.com:443/iris/csp/sys/UtilHome.csp?")
        );
    }

    #[test]
    fn no_web_server_means_no_url() {
        assert_eq!(portal_url(&ServerSpec::named("iris"), HOME_PAGE, ""), None);
    }
}
