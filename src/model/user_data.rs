//! Boot-time user data for Linux instances.
//!
//! A [`BootScript`] is an ordered list of shell commands. [`UserData`]
//! attaches it to an instance either as a plain `#!/bin/bash` script or
//! wrapped in a MIME multipart document. Both carry the same commands in the
//! same order.
//!
//! The script runs once at first boot, unsupervised: nothing checks its exit
//! status and a failure is invisible to the provisioning engine.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

use crate::error::{Error, Result};
use crate::token::Token;

/// Installer of the sync client fetched by the private host.
pub const SYNC_CLIENT_URL: &str =
    "https://www.goodsync.com/download/goodsync-linux-x86_64-release.run";

/// Package the sync client installer needs and the base image lacks.
pub const SYNC_CLIENT_DEPENDENCY: &str = "libxcrypt-compat";

/// Separator between the parts of a multipart document.
pub const MULTIPART_BOUNDARY: &str = "+AWS+CDK+User+Data+Separator==";

const SHEBANG: &str = "#!/bin/bash";

/// Ordered shell commands run at first boot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootScript {
    commands: Vec<String>,
}

impl BootScript {
    /// An empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// A script from commands.
    pub fn from_commands<I, S>(commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            commands: commands.into_iter().map(Into::into).collect(),
        }
    }

    /// Update packages, install the missing dependency, then download and
    /// silently run the sync client installer from `url`.
    pub fn sync_client(url: &Url) -> Result<Self> {
        if url.scheme() != "https" {
            return Err(Error::InvalidBootScript(format!(
                "installer must be fetched over https: {}",
                url
            )));
        }
        let file = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                Error::InvalidBootScript(format!("installer URL has no file name: {}", url))
            })?
            .to_string();

        Ok(Self::from_commands([
            "yum update -y".to_string(),
            format!("yum install -y {}", SYNC_CLIENT_DEPENDENCY),
            format!("curl -o {} {}", file, url),
            format!("chmod +x {}", file),
            format!("./{}", file),
        ]))
    }

    /// Append a command.
    pub fn push(&mut self, command: impl Into<String>) {
        self.commands.push(command.into());
    }

    /// Commands in execution order.
    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    /// True when there is nothing to run.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// How user data is attached to the instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserDataFormat {
    /// A plain shell script
    #[default]
    Inline,
    /// A MIME multipart document with one shell script part
    Multipart,
}

impl FromStr for UserDataFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "inline" | "plain" => Ok(UserDataFormat::Inline),
            "multipart" | "mime" => Ok(UserDataFormat::Multipart),
            other => Err(Error::invalid_context(
                "user_data_format",
                format!("'{}' (expected inline or multipart)", other),
            )),
        }
    }
}

impl fmt::Display for UserDataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserDataFormat::Inline => f.write_str("inline"),
            UserDataFormat::Multipart => f.write_str("multipart"),
        }
    }
}

/// Linux user data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserData {
    format: UserDataFormat,
    script: BootScript,
}

impl UserData {
    /// Empty Linux user data in the given format.
    pub fn for_linux(format: UserDataFormat) -> Self {
        Self {
            format,
            script: BootScript::new(),
        }
    }

    /// Append commands from a script.
    pub fn add_script(mut self, script: &BootScript) -> Self {
        self.script.commands.extend(script.commands.iter().cloned());
        self
    }

    /// Attachment format.
    pub fn format(&self) -> UserDataFormat {
        self.format
    }

    /// The shell script, regardless of format.
    pub fn script(&self) -> String {
        let mut lines = Vec::with_capacity(self.script.commands.len() + 1);
        lines.push(SHEBANG);
        lines.extend(self.script.commands.iter().map(String::as_str));
        lines.join("\n")
    }

    /// The payload handed to the instance.
    pub fn render(&self) -> String {
        match self.format {
            UserDataFormat::Inline => self.script(),
            UserDataFormat::Multipart => {
                let body = STANDARD.encode(self.script());
                [
                    format!(
                        "Content-Type: multipart/mixed; boundary=\"{}\"",
                        MULTIPART_BOUNDARY
                    ),
                    "MIME-Version: 1.0".to_string(),
                    String::new(),
                    format!("--{}", MULTIPART_BOUNDARY),
                    "Content-Type: text/x-shellscript; charset=\"utf-8\"".to_string(),
                    "Content-Transfer-Encoding: base64".to_string(),
                    String::new(),
                    body,
                    format!("--{}--", MULTIPART_BOUNDARY),
                ]
                .join("\n")
            }
        }
    }

    /// `UserData` property value.
    pub fn to_token(&self) -> Token {
        Token::Base64(Box::new(Token::from(self.render())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_script() -> BootScript {
        BootScript::sync_client(&Url::parse(SYNC_CLIENT_URL).unwrap()).unwrap()
    }

    #[test]
    fn test_sync_client_commands() {
        let script = default_script();
        assert_eq!(
            script.commands(),
            &[
                "yum update -y",
                "yum install -y libxcrypt-compat",
                "curl -o goodsync-linux-x86_64-release.run https://www.goodsync.com/download/goodsync-linux-x86_64-release.run",
                "chmod +x goodsync-linux-x86_64-release.run",
                "./goodsync-linux-x86_64-release.run",
            ]
        );
    }

    #[test]
    fn test_inline_script_order() {
        let user_data = UserData::for_linux(UserDataFormat::Inline).add_script(&default_script());
        let rendered = user_data.render();
        assert!(rendered.starts_with("#!/bin/bash\n"));
        let install = rendered.find("yum install -y libxcrypt-compat").unwrap();
        let download = rendered.find(SYNC_CLIENT_URL).unwrap();
        assert!(install < download);
    }

    #[test]
    fn test_multipart_wraps_same_script() {
        let script = default_script();
        let inline = UserData::for_linux(UserDataFormat::Inline).add_script(&script);
        let multipart = UserData::for_linux(UserDataFormat::Multipart).add_script(&script);

        let rendered = multipart.render();
        assert!(rendered.starts_with("Content-Type: multipart/mixed;"));
        assert!(rendered.ends_with(&format!("--{}--", MULTIPART_BOUNDARY)));

        let body = rendered
            .lines()
            .find(|l| !l.is_empty() && !l.contains(':') && !l.starts_with("--"))
            .unwrap();
        let decoded = String::from_utf8(STANDARD.decode(body).unwrap()).unwrap();
        assert_eq!(decoded, inline.script());
        assert_eq!(multipart.script(), inline.script());
    }

    #[test]
    fn test_installer_must_use_https() {
        let url = Url::parse("http://example.com/installer.run").unwrap();
        assert!(BootScript::sync_client(&url).is_err());
    }

    #[test]
    fn test_installer_needs_file_name() {
        let url = Url::parse("https://example.com/").unwrap();
        assert!(BootScript::sync_client(&url).is_err());
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("inline".parse::<UserDataFormat>().unwrap(), UserDataFormat::Inline);
        assert_eq!("MULTIPART".parse::<UserDataFormat>().unwrap(), UserDataFormat::Multipart);
        assert!("yaml".parse::<UserDataFormat>().is_err());
    }
}
