// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Path patterns that bypass the envelope protocol.
//!
//! Patterns use Ant-style wildcards: `?` matches one character and `*` any
//! run of characters inside a single path segment, while a `**` segment
//! matches any number of segments, including none. `/v1/public/**` therefore
//! matches `/v1/public`, `/v1/public/keys` and `/v1/public/a/b`.

use regex::RegexSet;

#[derive(Debug, Clone)]
pub struct ExemptionMatcher {
	context_path: String,
	patterns: Vec<String>,
	set: RegexSet,
}

impl ExemptionMatcher {
	/// `context_path` is the mount prefix (`""` or `"/api"`) removed from
	/// request paths before matching.
	pub fn new<I, S>(context_path: &str, patterns: I) -> Result<Self, regex::Error>
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let patterns: Vec<String> = patterns.into_iter().map(Into::into).collect();
		let set = RegexSet::new(patterns.iter().map(|p| pattern_to_regex(p)))?;
		Ok(Self {
			context_path: context_path.trim_end_matches('/').to_string(),
			patterns,
			set,
		})
	}

	pub fn patterns(&self) -> &[String] {
		&self.patterns
	}

	/// True if the request path bypasses the envelope.
	pub fn is_exempt(&self, request_path: &str) -> bool {
		self.set.is_match(self.normalize(request_path))
	}

	fn normalize<'a>(&self, path: &'a str) -> &'a str {
		let path = match path.strip_prefix(self.context_path.as_str()) {
			Some(rest) if !self.context_path.is_empty() && (rest.is_empty() || rest.starts_with('/')) => {
				rest
			}
			_ => path,
		};
		match path {
			"" => "/",
			p if p.len() > 1 => p.strip_suffix('/').unwrap_or(p),
			p => p,
		}
	}
}

fn pattern_to_regex(pattern: &str) -> String {
	let mut out = String::from("^");
	let body = pattern.strip_prefix('/').unwrap_or(pattern);

	for segment in body.split('/') {
		if segment == "**" {
			out.push_str("(?:/[^/]*)*");
			continue;
		}
		out.push('/');
		for ch in segment.chars() {
			match ch {
				'*' => out.push_str("[^/]*"),
				'?' => out.push_str("[^/]"),
				c => out.push_str(&regex::escape(c.encode_utf8(&mut [0u8; 4]))),
			}
		}
	}

	out.push('$');
	out
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	fn defaults() -> ExemptionMatcher {
		ExemptionMatcher::new(
			"",
			[
				"/v1/public/**",
				"/v1/dev/**",
				"/actuator/**",
				"/swagger-ui/**",
				"/v3/api-docs/**",
				"/health",
				"/metrics",
			],
		)
		.unwrap()
	}

	#[test]
	fn double_star_matches_any_depth() {
		let m = defaults();
		assert!(m.is_exempt("/v1/public/keys"));
		assert!(m.is_exempt("/v1/public"));
		assert!(m.is_exempt("/v1/public/"));
		assert!(m.is_exempt("/v1/dev/encrypt"));
		assert!(m.is_exempt("/v3/api-docs/a/b/c"));
	}

	#[test]
	fn exact_patterns_are_exact() {
		let m = defaults();
		assert!(m.is_exempt("/health"));
		assert!(m.is_exempt("/health/"));
		assert!(!m.is_exempt("/healthz"));
		assert!(!m.is_exempt("/health/deep"));
	}

	#[test]
	fn protected_paths_are_not_exempt() {
		let m = defaults();
		for path in ["/v1/echo", "/v1/publicity", "/v1/publi", "/", "/v1/auth/login"] {
			assert!(!m.is_exempt(path), "{path} should be protected");
		}
	}

	#[test]
	fn single_star_stays_in_segment() {
		let m = ExemptionMatcher::new("", ["/files/*.txt", "/v?/ping"]).unwrap();
		assert!(m.is_exempt("/files/a.txt"));
		assert!(!m.is_exempt("/files/a/b.txt"));
		assert!(m.is_exempt("/v1/ping"));
		assert!(!m.is_exempt("/v10/ping"));
	}

	#[test]
	fn regex_metacharacters_are_literal() {
		let m = ExemptionMatcher::new("", ["/a.b/(c)"]).unwrap();
		assert!(m.is_exempt("/a.b/(c)"));
		assert!(!m.is_exempt("/axb/(c)"));
	}

	#[test]
	fn context_path_is_stripped() {
		let m = ExemptionMatcher::new("/api", ["/v1/public/**", "/health"]).unwrap();
		assert!(m.is_exempt("/api/v1/public/keys"));
		assert!(m.is_exempt("/api/health"));
		assert!(!m.is_exempt("/apix/health"));
		assert!(!m.is_exempt("/api/v1/echo"));
	}

	#[test]
	fn empty_pattern_list_exempts_nothing() {
		let m = ExemptionMatcher::new("", Vec::<String>::new()).unwrap();
		assert!(!m.is_exempt("/health"));
	}

	proptest! {
		#[test]
		fn double_star_accepts_any_suffix(segments in proptest::collection::vec("[a-zA-Z0-9._-]{1,12}", 0..5)) {
			let path = format!("/v1/public/{}", segments.join("/"));
			prop_assert!(defaults().is_exempt(&path));
		}

		#[test]
		fn sibling_prefixes_never_match(suffix in "[a-z]{1,8}", rest in "[a-z/]{0,16}") {
			let path = format!("/v1/public{suffix}/{rest}");
			prop_assert!(!defaults().is_exempt(&path));
		}

		#[test]
		fn star_never_crosses_a_slash(a in "[a-z]{1,8}", b in "[a-z]{1,8}") {
			let m = ExemptionMatcher::new("", ["/x/*"]).unwrap();
			let one_segment = format!("/x/{a}");
			let two_segments = format!("/x/{a}/{b}");
			prop_assert!(m.is_exempt(&one_segment));
			prop_assert!(!m.is_exempt(&two_segments));
		}
	}
}
