use regex::Regex;
use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::{Header, Status};
use rocket::request::{FromRequest, Outcome};
use rocket::{Request, Response};
use tracing::{debug, info};

use crate::config::{ConfigurationError, CLIENT_PORT};

/// Origins allowed to talk to the server, derived from the client's port:
/// `http://localhost:<port>` and hosts on the 192.168.1.0/24 LAN.
#[derive(Debug, Clone)]
pub struct OriginPolicy {
    localhost: String,
    private_subnet: Regex,
}

impl OriginPolicy {
    pub fn new(client_port: u16) -> Result<Self, ConfigurationError> {
        if client_port == 0 {
            return Err(ConfigurationError::invalid(CLIENT_PORT, "port must be non-zero"));
        }
        let private_subnet = Regex::new(&format!(r"^http://192\.168\.1\.([1-9]|[1-9]\d):{client_port}$"))
            .map_err(|e| ConfigurationError::invalid(CLIENT_PORT, e.to_string()))?;

        let policy = Self {
            localhost: format!("http://localhost:{client_port}"),
            private_subnet,
        };
        info!("Allowing origins {} and {}", policy.localhost, policy.private_subnet);
        Ok(policy)
    }

    pub fn allows(&self, origin: &str) -> bool {
        origin == self.localhost || self.private_subnet.is_match(origin)
    }
}

pub struct Cors;

#[rocket::async_trait]
impl Fairing for Cors {
    fn info(&self) -> Info {
        Info {
            name: "CORS",
            kind: Kind::Response
        }
    }

    async fn on_response<'r>(&self, req: &'r Request<'_>, res: &mut Response<'r>) {
        let Some(origin) = req.headers().get_one("Origin") else { return };
        let Some(policy) = req.rocket().state::<OriginPolicy>() else { return };

        if policy.allows(origin) {
            res.set_header(Header::new("Access-Control-Allow-Origin", origin.to_string()));
            res.set_header(Header::new("Vary", "Origin"));
            res.set_header(Header::new("Access-Control-Allow-Methods", "POST, GET, OPTIONS"));
            res.set_header(Header::new("Access-Control-Allow-Headers", "Content-Type, token"));
            res.set_header(Header::new("Access-Control-Allow-Credentials", "true"));
            res.set_header(Header::new("Access-Control-Max-Age", "86400"));
        }
    }
}

/// Request guard for the WebSocket upgrade: refuses browser origins outside
/// the policy before any credential is looked at. Requests without an
/// `Origin` header are not cross-origin and pass.
#[derive(Debug, Clone, Copy)]
pub struct AllowedOrigin;

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AllowedOrigin {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let Some(origin) = req.headers().get_one("Origin") else {
            return Outcome::Success(AllowedOrigin);
        };

        match req.rocket().state::<OriginPolicy>() {
            Some(policy) if policy.allows(origin) => Outcome::Success(AllowedOrigin),
            _ => {
                debug!("Refusing connection from origin {}", origin);
                Outcome::Error((Status::Forbidden, ()))
            }
        }
    }
}
