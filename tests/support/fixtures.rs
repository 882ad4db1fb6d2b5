//! Fake external tools and configuration fixtures.

use super::Test;
use base64::Engine;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

/// `oci` stand-in: serves secrets from `secrets/<id>` and records publishes
/// in `ons.log` (`topic|title` per line). `ons.fail` makes publishing fail.
const FAKE_OCI: &str = r#"#!/bin/sh
case "$1 $2" in
  "secrets secret-bundle")
    if [ -f "@STATE@/secrets/$5" ]; then
      printf '{"data":{"secret-bundle-content":{"content-type":"BASE64","content":"%s"}}}\n' "$(cat "@STATE@/secrets/$5")"
    else
      echo 'ServiceError: {"status": 404, "code": "NotAuthorizedOrNotFound"}' >&2
      exit 4
    fi
    ;;
  "ons message")
    if [ -f "@STATE@/ons.fail" ]; then
      echo 'ServiceError: {"status": 500}' >&2
      exit 1
    fi
    printf '%s|%s\n' "$5" "$7" >> "@STATE@/ons.log"
    printf '%s\n' "$9" >> "@STATE@/ons.body"
    ;;
  *)
    echo "unexpected oci call: $*" >&2
    exit 2
    ;;
esac
"#;

/// `rclone` stand-in: records its argv and the injected key id, optionally
/// sleeps (`rclone.sleep`), then exits with the code in `rclone.exit`.
const FAKE_RCLONE: &str = r#"#!/bin/sh
echo "$* key=$AWS_ACCESS_KEY_ID" >> "@STATE@/rclone.log"
if [ -f "@STATE@/rclone.sleep" ]; then
  sleep "$(cat "@STATE@/rclone.sleep")"
fi
exit "$(cat "@STATE@/rclone.exit" 2>/dev/null || echo 0)"
"#;

/// `systemctl` stand-in: records every call in `systemctl.log` and keeps
/// enabled units under `enabled/`. `systemctl.fail` makes every call fail.
const FAKE_SYSTEMCTL: &str = r#"#!/bin/sh
echo "$*" >> "@STATE@/systemctl.log"
if [ -f "@STATE@/systemctl.fail" ]; then
  echo "Failed to connect to bus: No such file or directory" >&2
  exit 1
fi
case "$1" in
  is-enabled)
    [ -f "@STATE@/enabled/$2" ]
    ;;
  enable)
    for unit in "$@"; do :; done
    mkdir -p "@STATE@/enabled"
    touch "@STATE@/enabled/$unit"
    ;;
esac
"#;

fn write_executable(path: &Path, contents: &str) {
    fs::write(path, contents).expect("failed to write script");
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .expect("failed to chmod script");
}

impl Test {
    pub(super) fn install_fake_tools(&self) {
        let state = self.dir.path().display().to_string();
        fs::create_dir_all(self.path("bin")).unwrap();
        fs::create_dir_all(self.path("secrets")).unwrap();
        for (name, script) in [
            ("oci", FAKE_OCI),
            ("rclone", FAKE_RCLONE),
            ("systemctl", FAKE_SYSTEMCTL),
        ] {
            write_executable(
                &self.path(&format!("bin/{}", name)),
                &script.replace("@STATE@", &state),
            );
        }
    }

    /// Store a secret the fake `oci` will serve, base64-encoded like the vault does.
    pub fn secret(&self, id: &str, plaintext: &str) {
        let encoded = base64::engine::general_purpose::STANDARD.encode(plaintext);
        fs::write(self.path(&format!("secrets/{}", id)), encoded).unwrap();
    }

    /// Store raw bundle content, bypassing encoding.
    pub fn raw_secret(&self, id: &str, content: &str) {
        fs::write(self.path(&format!("secrets/{}", id)), content).unwrap();
    }

    pub fn rclone_exits_with(&self, code: i32) {
        fs::write(self.path("rclone.exit"), code.to_string()).unwrap();
    }

    pub fn rclone_sleeps(&self, secs: u32) {
        fs::write(self.path("rclone.sleep"), secs.to_string()).unwrap();
    }

    /// Make the fake `systemctl` fail (`true`) or work again (`false`).
    pub fn systemctl_fails(&self, fail: bool) {
        let marker = self.path("systemctl.fail");
        if fail {
            fs::write(marker, "").unwrap();
        } else {
            let _ = fs::remove_file(marker);
        }
    }

    pub fn is_enabled(&self, unit: &str) -> bool {
        self.path("enabled").join(unit).exists()
    }

    pub fn fail_publishing(&self) {
        fs::write(self.path("ons.fail"), "").unwrap();
    }

    /// Recorded publishes, one `topic|title` entry each.
    pub fn publishes(&self) -> Vec<String> {
        self.read("ons.log").lines().map(str::to_string).collect()
    }

    pub fn rclone_calls(&self) -> Vec<String> {
        self.read("rclone.log").lines().map(str::to_string).collect()
    }

    pub fn systemctl_calls(&self) -> Vec<String> {
        self.read("systemctl.log").lines().map(str::to_string).collect()
    }

    /// Default configuration for this environment.
    pub fn base_config(&self) -> String {
        let dir = self.dir.path().display();
        format!(
            r#"host_id = "mirror-test"

[[credentials]]
env = "AWS_ACCESS_KEY_ID"
secret_id = "key-id"

[[credentials]]
env = "AWS_SECRET_ACCESS_KEY"
secret_id = "secret-key"

[sync]
source = "oci:bling"
destination = "s3:cost-archive/oci"

[notify]
topic_id = "ocid1.onstopic.oc1..test"

[paths]
log_file = "{dir}/skiff.log"
lock_file = "{dir}/skiff.lock"
cron_file = "{dir}/cron.d/skiff"
systemd_dir = "{dir}/systemd"

[tools]
oci = "{dir}/bin/oci"
rclone = "{dir}/bin/rclone"
systemctl = "{dir}/bin/systemctl"
skiff = "/usr/local/bin/skiff"
"#
        )
    }

    /// Write the default configuration followed by `extra`.
    pub fn write_config(&self, extra: &str) {
        self.write_raw_config(&format!("{}\n{}", self.base_config(), extra));
    }

    pub fn write_raw_config(&self, contents: &str) {
        fs::write(self.config_path(), contents).unwrap();
    }
}
