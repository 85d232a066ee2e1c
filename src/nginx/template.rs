//! Virtual-host template rendering.

use chrono::{DateTime, Local};

/// Path of the health endpoint every generated server block exposes.
pub const HEALTH_PATH: &str = "/nginx-health";

/// First line of every generated config.
pub const HEADER: &str = "# proxy-sites generated configuration";

/// True if `contents` was produced by [`render`].
pub fn is_generated(contents: &str) -> bool {
    contents.lines().next() == Some(HEADER)
}

/// Renders a reverse-proxy server block stamped with the current time.
pub fn render(domain: &str, port: &str, backend_host: &str) -> String {
    render_at(domain, port, backend_host, Local::now())
}

/// Renders a reverse-proxy server block with an explicit generation time.
///
/// `domain` may hold several whitespace-separated server names.
pub fn render_at(
    domain: &str,
    port: &str,
    backend_host: &str,
    generated: DateTime<Local>,
) -> String {
    format!(
        r##"{header}
# Domain: {domain} | Port: {port} | Host: {backend_host} | Generated: {generated}

server {{
    listen 80;
    server_name {domain};

    # Security headers
    add_header X-Frame-Options "SAMEORIGIN" always;
    add_header X-Content-Type-Options "nosniff" always;
    add_header X-XSS-Protection "1; mode=block" always;

    location / {{
        proxy_pass http://{backend_host}:{port};
        proxy_http_version 1.1;

        # WebSocket support
        proxy_set_header Upgrade $http_upgrade;
        proxy_set_header Connection 'upgrade';
        proxy_cache_bypass $http_upgrade;

        proxy_set_header Host $host;
        proxy_set_header X-Real-IP $remote_addr;
        proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;
        proxy_set_header X-Forwarded-Proto $scheme;

        proxy_connect_timeout 60s;
        proxy_send_timeout 60s;
        proxy_read_timeout 60s;
    }}

    location {health} {{
        access_log off;
        return 200 "healthy\n";
        add_header Content-Type text/plain;
    }}
}}
"##,
        domain = domain.trim(),
        port = port.trim(),
        backend_host = backend_host.trim(),
        generated = generated.format("%Y-%m-%d %H:%M:%S %:z"),
        health = HEALTH_PATH,
        header = HEADER,
    )
}
