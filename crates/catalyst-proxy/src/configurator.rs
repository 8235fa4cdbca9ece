//! Proxy Configurator (C8): renders an nginx-shaped server block for a
//! deployment, installs it, and reloads the proxy daemon. Only invoked in
//! production mode (a platform domain is configured).

use std::path::{Path, PathBuf};

use catalyst_core::PrivilegedOps;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("failed to write proxy config: {0}")]
    Write(#[source] catalyst_core::PrivilegedOpError),

    #[error("failed to install sites-enabled symlink: {0}")]
    Symlink(#[source] catalyst_core::PrivilegedOpError),

    #[error("failed to reload proxy: {0}")]
    Reload(#[source] catalyst_core::PrivilegedOpError),
}

pub struct ProxyPaths {
    pub sites_available: PathBuf,
    pub sites_enabled: PathBuf,
}

pub struct ConfigureRequest<'a> {
    pub deployment_id: i32,
    pub hostname: &'a str,
    pub port: u16,
    pub build_output_path: &'a Path,
    pub use_https: bool,
}

/// Renders and installs the reverse-proxy config for one deployment, then
/// reloads the proxy. The reload is issued even when a near-identical
/// config already exists, since the symlink install is overwrite-safe but
/// not itself observable by the proxy until a reload runs.
pub async fn configure(
    request: &ConfigureRequest<'_>,
    paths: &ProxyPaths,
    privileged: &dyn PrivilegedOps,
) -> Result<(), ProxyError> {
    let rendered = render(request);
    let filename = format!("deploy-{}.conf", request.deployment_id);
    let available_path = paths.sites_available.join(&filename);
    let enabled_path = paths.sites_enabled.join(&filename);

    privileged
        .write_file(&available_path, &rendered)
        .await
        .map_err(ProxyError::Write)?;
    privileged
        .symlink(&available_path, &enabled_path)
        .await
        .map_err(ProxyError::Symlink)?;
    privileged.reload_proxy().await.map_err(ProxyError::Reload)?;

    Ok(())
}

fn render(request: &ConfigureRequest<'_>) -> String {
    let static_next = format!("{}/.next/static", request.build_output_path.display());
    let static_public = format!("{}/public", request.build_output_path.display());

    let mut out = String::new();
    out.push_str(&format!(
        "server {{\n    listen 80;\n    server_name {host};\n\n",
        host = request.hostname
    ));
    if request.use_https {
        out.push_str("    return 301 https://$host$request_uri;\n}\n\n");
        out.push_str(&https_block(request, &static_next, &static_public));
    } else {
        out.push_str(&upstream_block(request, &static_next, &static_public));
        out.push_str("}\n");
    }
    out
}

fn https_block(request: &ConfigureRequest<'_>, static_next: &str, static_public: &str) -> String {
    let cert_path = format!("/etc/catalyst/certs/{}", request.hostname);
    format!(
        "server {{\n    listen 443 ssl http2;\n    server_name {host};\n\n    ssl_certificate {cert}/fullchain.pem;\n    ssl_certificate_key {cert}/privkey.pem;\n    ssl_session_cache shared:SSL:10m;\n    ssl_session_timeout 1d;\n    ssl_protocols TLSv1.2 TLSv1.3;\n    ssl_ciphers HIGH:!aNULL:!MD5;\n\n{upstream}}}\n",
        host = request.hostname,
        cert = cert_path,
        upstream = upstream_block(request, static_next, static_public),
    )
}

fn upstream_block(request: &ConfigureRequest<'_>, static_next: &str, static_public: &str) -> String {
    format!(
        "    location / {{\n        proxy_pass http://127.0.0.1:{port};\n        proxy_http_version 1.1;\n        proxy_set_header Upgrade $http_upgrade;\n        proxy_set_header Connection \"upgrade\";\n        proxy_set_header Host $host;\n        proxy_set_header X-Real-IP $remote_addr;\n        proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;\n        proxy_set_header X-Forwarded-Proto $scheme;\n    }}\n\n    location /_next/static/ {{\n        alias {static_next}/;\n        expires 1y;\n        add_header Cache-Control \"public, immutable\";\n    }}\n\n    location /static/ {{\n        alias {static_public}/;\n        expires 1y;\n        add_header Cache-Control \"public, immutable\";\n    }}\n",
        port = request.port,
        static_next = static_next,
        static_public = static_public,
    )
}
