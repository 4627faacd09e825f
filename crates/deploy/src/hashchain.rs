//! The package → loader → entry document hash chain.
//!
//! Each package script is named by the hash of its content. The loader
//! script embeds the ordered `(path, hash)` manifest of every package, so
//! its own hash changes whenever any package changes. The entry document
//! references the loader by hash, closing the chain: one entry hash pins
//! the exact bytes of every script a page will run.

use std::fmt;

use serde::Serialize;
use sha2::{Digest, Sha256};

use hashpub_protocol::{PRELUDE_PATH, naming};

use crate::error::DeployError;
use crate::template::Template;

/// Fields available to loader templates.
const LOADER_FIELDS: &[&str] = &["Path", "Json", "PkgProtocol", "PkgHost"];

/// Fields available to entry document templates.
pub const ENTRY_FIELDS: &[&str] = &["Path", "Hash", "Script"];

const LOADER_TEMPLATE: &str = r#""use strict";
var $mainPkg;
var $load = {};
(function() {
	var entry = {{ .Path }};
	var manifest = {{ .Json }};
	var requested = 0;
	var loaded = 0;
	var start = function() {
		for (var i = 0; i < manifest.length; i++) {
			$load[manifest[i].path]();
		}
		$mainPkg = $packages[entry];
		$synthesizeMethods();
		$packages["runtime"].$init();
		$go($mainPkg.$init, []);
		$flushConsole();
	};
	var onload = function() {
		loaded++;
		if (window.hashpubProgress) {
			window.hashpubProgress(loaded, requested);
		}
		if (loaded === requested) {
			start();
		}
	};
	var request = function(url) {
		requested++;
		var tag = document.createElement("script");
		tag.src = url;
		tag.onload = onload;
		document.head.appendChild(tag);
	};
	for (var i = 0; i < manifest.length; i++) {
		request("{{ .PkgProtocol }}://{{ .PkgHost }}/" + manifest[i].path + "." + manifest[i].hash + ".js");
	}
})();
"#;

const LOADER_TEMPLATE_MINIFIED: &str = r#""use strict";var $mainPkg;var $load={};(function(){var e={{ .Path }},m={{ .Json }},r=0,l=0,s=function(){for(var i=0;i<m.length;i++){$load[m[i].path]()}$mainPkg=$packages[e];$synthesizeMethods();$packages["runtime"].$init();$go($mainPkg.$init,[]);$flushConsole()},o=function(){l++;if(window.hashpubProgress){window.hashpubProgress(l,r)}if(l===r){s()}},q=function(u){r++;var t=document.createElement("script");t.src=u;t.onload=o;document.head.appendChild(t)};for(var i=0;i<m.length;i++){q("{{ .PkgProtocol }}://{{ .PkgHost }}/"+m[i].path+"."+m[i].hash+".js")}})();"#;

/// Entry document used when the project does not provide one.
pub const DEFAULT_ENTRY_TEMPLATE: &str = r#"<html>
<head>
	<meta charset="utf-8">
	<title>{{ .Path }}</title>
</head>
<body id="wrapper">
	<span id="hashpub-progress" style="font-family: sans-serif; color: #999">Loading...</span>
	<script>
		window.hashpubProgress = function(count, total) {
			var value = total ? count / total : 0;
			var el = document.getElementById("hashpub-progress");
			if (value >= 1) {
				el.remove();
			} else {
				el.textContent = "Loading " + Math.round(value * 100) + "%";
			}
		};
	</script>
	<script src="{{ .Script }}"></script>
</body>
</html>
"#;

/// SHA-256 of a published artifact.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    pub fn of(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

/// One manifest entry in a loader script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageRef {
    pub path: String,
    pub hash: String,
}

impl PackageRef {
    pub fn new(path: impl Into<String>, hash: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            hash: hash.into(),
        }
    }
}

/// Builds a loader manifest: the prelude first, then `packages` in order.
pub fn loader_manifest(
    prelude_hash: &str,
    packages: impl IntoIterator<Item = PackageRef>,
) -> Vec<PackageRef> {
    std::iter::once(PackageRef::new(PRELUDE_PATH, prelude_hash))
        .chain(packages)
        .collect()
}

/// Where browsers fetch package scripts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptHost<'a> {
    pub protocol: &'a str,
    pub host: &'a str,
}

/// Rendered artifact bytes and their hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub content: Vec<u8>,
    pub hash: ContentHash,
}

impl Rendered {
    fn new(content: String) -> Self {
        let content = content.into_bytes();
        let hash = ContentHash::of(&content);
        Self { content, hash }
    }
}

/// Renders the loader script for `entry_path`.
///
/// The output is a pure function of its inputs.
pub fn build_loader_script(
    entry_path: &str,
    manifest: &[PackageRef],
    minified: bool,
    host: ScriptHost<'_>,
) -> Result<Rendered, DeployError> {
    let source = if minified {
        LOADER_TEMPLATE_MINIFIED
    } else {
        LOADER_TEMPLATE
    };
    let template = Template::parse(source, LOADER_FIELDS)?;
    let path = serde_json::to_string(entry_path)?;
    let json = serde_json::to_string(manifest)?;
    let content = template.render(&[
        ("Path", &path),
        ("Json", &json),
        ("PkgProtocol", host.protocol),
        ("PkgHost", host.host),
    ])?;
    Ok(Rendered::new(content))
}

/// Parses a project entry template, or the default one.
pub fn entry_template(project: Option<&str>) -> Result<Template, DeployError> {
    Template::parse(project.unwrap_or(DEFAULT_ENTRY_TEMPLATE), ENTRY_FIELDS)
}

/// Renders the entry document that boots `entry_path` through its loader.
pub fn build_entry_document(
    template: &Template,
    entry_path: &str,
    loader_hash: &ContentHash,
    host: ScriptHost<'_>,
) -> Result<Rendered, DeployError> {
    let hash = loader_hash.to_hex();
    let script = naming::script_url(host.protocol, host.host, entry_path, &hash);
    let content = template.render(&[("Path", entry_path), ("Hash", &hash), ("Script", &script)])?;
    Ok(Rendered::new(content))
}
