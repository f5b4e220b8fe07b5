#![forbid(unsafe_code)]

pub mod endpoint {
	/// Parsed `ws://host[:port]` or `wss://host[:port]` endpoint.
	#[derive(Debug, Clone, PartialEq, Eq, Hash)]
	pub struct WsEndpoint {
		pub secure: bool,
		pub host: String,
		pub port: u16,
	}

	impl WsEndpoint {
		pub fn scheme(&self) -> &'static str {
			if self.secure { "wss" } else { "ws" }
		}

		/// Returns `host:port` (host preserved, IPv6 stays bracketed).
		pub fn hostport(&self) -> String {
			format!("{}:{}", self.host, self.port)
		}

		/// Build a URL from path segments. Each segment is percent-encoded; the path ends with `/`.
		pub fn url_with_segments<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> String {
			let mut url = format!("{}://{}/", self.scheme(), self.hostport());
			for segment in segments {
				let segment = segment.trim_matches('/');
				if segment.is_empty() {
					continue;
				}
				url.push_str(&urlencoding::encode(segment));
				url.push('/');
			}
			url
		}

		/// Parse an endpoint string in the form `ws://host[:port]` or `wss://host[:port]`.
		pub fn parse(s: &str) -> Result<Self, String> {
			let s = s.trim();
			if s.is_empty() {
				return Err("endpoint must be non-empty (expected ws://host:port)".to_string());
			}

			let (secure, rest) = if let Some(rest) = s.strip_prefix("wss://") {
				(true, rest)
			} else if let Some(rest) = s.strip_prefix("ws://") {
				(false, rest)
			} else {
				return Err(format!("invalid endpoint (expected ws://host:port or wss://host:port): {s}"));
			};

			let rest = rest.strip_suffix('/').unwrap_or(rest);
			if rest.contains('/') || rest.contains('?') || rest.contains('#') {
				return Err(format!(
					"invalid endpoint (expected ws://host:port without path/query/fragment): {s}"
				));
			}

			let default_port = if secure { 443 } else { 80 };

			let (host, port) = if rest.starts_with('[') {
				// Bracketed IPv6, optional port after the closing bracket.
				let end = rest
					.find(']')
					.ok_or_else(|| format!("invalid endpoint host (unterminated IPv6 bracket): {s}"))?;
				let host = &rest[..=end];
				let port = match &rest[end + 1..] {
					"" => default_port,
					p => parse_port(p.strip_prefix(':').unwrap_or(p), s)?,
				};
				(host, port)
			} else {
				match rest.rsplit_once(':') {
					Some((host, port_str)) => {
						if host.contains(':') {
							return Err(format!(
								"invalid endpoint host (IPv6 must be bracketed like ws://[::1]:8000): {s}"
							));
						}
						(host, parse_port(port_str, s)?)
					}
					None => (rest, default_port),
				}
			};

			let host = host.trim();
			if host.is_empty() {
				return Err(format!("invalid endpoint host (expected ws://host:port): {s}"));
			}

			Ok(Self {
				secure,
				host: host.to_string(),
				port,
			})
		}
	}

	fn parse_port(port_str: &str, original: &str) -> Result<u16, String> {
		let port: u16 = port_str
			.trim()
			.parse()
			.map_err(|_| format!("invalid endpoint port (expected 1..=65535): {original}"))?;
		if port == 0 {
			return Err(format!("invalid endpoint port (expected 1..=65535): {original}"));
		}
		Ok(port)
	}

	/// Validate `ws://host:port`.
	pub fn validate_ws_endpoint(s: &str) -> Result<(), String> {
		let _ = WsEndpoint::parse(s)?;
		Ok(())
	}

}
