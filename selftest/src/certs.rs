/*!

Certificate helpers for request-header authentication tests. A CA is written to
`<dir>/<prefix>.crt` and `<dir>/<prefix>.key` together with a serial file
`<dir>/<prefix>.serial.txt`; certificates signed by it are written to `<dir>/<name>.crt` and
`<dir>/<name>.key`.

!*/

use anyhow::{Context, Result};
use log::debug;
use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DistinguishedName, DnType,
    ExtendedKeyUsagePurpose, IsCa, KeyPair, KeyUsagePurpose, SerialNumber,
};
use std::fs;
use std::path::{Path, PathBuf};
use time::{Duration, OffsetDateTime};

/// CA certificates are valid for five years.
pub const CA_LIFETIME_DAYS: i64 = 365 * 5;

/// Leaf certificates are valid for two years.
pub const CERT_LIFETIME_DAYS: i64 = 365 * 2;

/// Certificates are backdated to tolerate clock skew between the harness and the cluster.
const BACKDATE: Duration = Duration::minutes(5);

/// A certificate and private key, in memory and on disk.
#[derive(Clone, Debug)]
pub struct CertPair {
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
    pub cert_pem: String,
    pub key_pem: String,
}

impl CertPair {
    /// The certificate followed by the key, as expected by `reqwest::Identity::from_pem`.
    pub fn identity_pem(&self) -> Vec<u8> {
        [self.cert_pem.as_bytes(), self.key_pem.as_bytes()].concat()
    }
}

pub fn cert_filename(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.crt", name))
}

pub fn key_filename(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.key", name))
}

pub fn serial_filename(dir: &Path, prefix: &str) -> PathBuf {
    dir.join(format!("{}.serial.txt", prefix))
}

/// Creates a self-signed CA named `prefix`, overwriting any existing one, and resets its serial
/// file. Returns the CA's files.
pub fn create_ca(dir: &Path, prefix: &str) -> Result<CertPair> {
    let mut params = CertificateParams::default();
    params.distinguished_name = common_name(prefix, &[]);
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyEncipherment,
        KeyUsagePurpose::KeyCertSign,
    ];
    set_validity(&mut params, CA_LIFETIME_DAYS);
    params.serial_number = Some(SerialNumber::from(1u64));

    let key = KeyPair::generate().context("unable to generate CA key")?;
    let cert = params
        .self_signed(&key)
        .context("unable to self-sign CA certificate")?;
    fs::write(serial_filename(dir, prefix), format_serial(1))?;
    debug!("created CA '{}' in '{}'", prefix, dir.display());
    write_pair(dir, prefix, &cert, &key)
}

/// Creates a client certificate for the user `common_name` in `groups`, signed by the CA named
/// `ca_prefix`.
pub fn create_client_cert(
    common_name: &str,
    groups: &[&str],
    dir: &Path,
    ca_prefix: &str,
) -> Result<CertPair> {
    let mut params = CertificateParams::default();
    params.distinguished_name = self::common_name(common_name, groups);
    params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ClientAuth];
    sign(params, common_name, dir, ca_prefix)
}

/// Creates a serving certificate for `hostnames` (DNS names or IP addresses), signed by the CA
/// named `ca_prefix`.
pub fn create_server_cert(
    hostnames: &[&str],
    common_name: &str,
    dir: &Path,
    ca_prefix: &str,
) -> Result<CertPair> {
    let hostnames: Vec<String> = hostnames.iter().map(|h| h.to_string()).collect();
    let mut params =
        CertificateParams::new(hostnames).context("invalid server certificate hostname")?;
    params.distinguished_name = self::common_name(common_name, &[]);
    params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];
    sign(params, common_name, dir, ca_prefix)
}

fn sign(
    mut params: CertificateParams,
    name: &str,
    dir: &Path,
    ca_prefix: &str,
) -> Result<CertPair> {
    let (ca_cert, ca_key) = load_ca(dir, ca_prefix)?;
    params.is_ca = IsCa::NoCa;
    params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyEncipherment,
    ];
    params.use_authority_key_identifier_extension = true;
    set_validity(&mut params, CERT_LIFETIME_DAYS);
    params.serial_number = Some(SerialNumber::from(next_serial(dir, ca_prefix)?));

    let key = KeyPair::generate().context("unable to generate key")?;
    let cert = params
        .signed_by(&key, &ca_cert, &ca_key)
        .with_context(|| format!("unable to sign certificate for '{}'", name))?;
    debug!("signed '{}' with CA '{}'", name, ca_prefix);
    write_pair(dir, name, &cert, &key)
}

/// Reads the CA back from disk. rcgen signs with a `Certificate`, so the parsed parameters are
/// re-signed with the CA key to get one.
fn load_ca(dir: &Path, prefix: &str) -> Result<(Certificate, KeyPair)> {
    let cert_file = cert_filename(dir, prefix);
    let key_file = key_filename(dir, prefix);
    let cert_pem = fs::read_to_string(&cert_file)
        .with_context(|| format!("unable to read CA certificate '{}'", cert_file.display()))?;
    let key_pem = fs::read_to_string(&key_file)
        .with_context(|| format!("unable to read CA key '{}'", key_file.display()))?;
    let key = KeyPair::from_pem(&key_pem).context("unable to parse CA key")?;
    let cert = CertificateParams::from_ca_cert_pem(&cert_pem)
        .context("unable to parse CA certificate")?
        .self_signed(&key)
        .context("unable to reconstruct CA certificate")?;
    Ok((cert, key))
}

/// Returns the serial to use for the next signed certificate and advances the serial file.
fn next_serial(dir: &Path, prefix: &str) -> Result<u64> {
    let path = serial_filename(dir, prefix);
    let current = fs::read_to_string(&path)
        .with_context(|| format!("unable to read serial file '{}'", path.display()))?;
    let serial = parse_serial(&current)
        .with_context(|| format!("invalid serial '{}' in '{}'", current.trim(), path.display()))?;
    let next = serial + 1;
    fs::write(&path, format_serial(next))?;
    Ok(next)
}

fn parse_serial(s: &str) -> Result<u64> {
    Ok(u64::from_str_radix(s.trim(), 16)?)
}

fn format_serial(serial: u64) -> String {
    format!("{:02X}\n", serial)
}

fn common_name(name: &str, organizations: &[&str]) -> DistinguishedName {
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, name);
    for organization in organizations {
        dn.push(DnType::OrganizationName, *organization);
    }
    dn
}

fn set_validity(params: &mut CertificateParams, days: i64) {
    let not_before = OffsetDateTime::now_utc() - BACKDATE;
    params.not_before = not_before;
    params.not_after = not_before + Duration::days(days);
}

fn write_pair(dir: &Path, name: &str, cert: &Certificate, key: &KeyPair) -> Result<CertPair> {
    let pair = CertPair {
        cert_file: cert_filename(dir, name),
        key_file: key_filename(dir, name),
        cert_pem: cert.pem(),
        key_pem: key.serialize_pem(),
    };
    fs::write(&pair.cert_file, &pair.cert_pem)
        .with_context(|| format!("unable to write '{}'", pair.cert_file.display()))?;
    fs::write(&pair.key_file, &pair.key_pem)
        .with_context(|| format!("unable to write '{}'", pair.key_file.display()))?;
    Ok(pair)
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn serial_round_trip() {
        assert_eq!(format_serial(1), "01\n");
        assert_eq!(format_serial(255), "FF\n");
        assert_eq!(parse_serial("0A\n").unwrap(), 10);
        assert!(parse_serial("zz").is_err());
    }

    #[test]
    fn ca_signs_client_and_server_certs() {
        let dir = TempDir::new().unwrap();
        let ca = create_ca(dir.path(), "frontproxycatest").unwrap();
        assert!(ca.cert_pem.starts_with("-----BEGIN CERTIFICATE-----"));
        assert!(ca.cert_file.ends_with("frontproxycatest.crt"));
        assert!(ca.key_file.exists());

        let client = create_client_cert(
            "frontproxycerttest",
            &["system:masters"],
            dir.path(),
            "frontproxycatest",
        )
        .unwrap();
        assert!(client.cert_file.ends_with("frontproxycerttest.crt"));
        assert!(client.key_pem.contains("PRIVATE KEY"));

        create_server_cert(
            &["localhost", "127.0.0.1"],
            "server",
            dir.path(),
            "frontproxycatest",
        )
        .unwrap();

        let serial = fs::read_to_string(serial_filename(dir.path(), "frontproxycatest")).unwrap();
        assert_eq!(serial, "03\n");
    }

    #[test]
    fn signing_requires_ca() {
        let dir = TempDir::new().unwrap();
        assert!(create_client_cert("user", &[], dir.path(), "missing").is_err());
    }
}
