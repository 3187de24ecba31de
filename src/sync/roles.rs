use anyhow::Result;
use tokio::sync::Mutex;

use crate::db::Store;
use crate::models::DeviceRole;

const GOLDEN_RATIO: f64 = 0.618033988749895;
const SATURATION: f64 = 0.7;
const LIGHTNESS: f64 = 0.6;

/// Resolves role names to persisted roles, creating new ones with the next
/// color in a golden-ratio hue sequence. Existing roles are never recolored.
pub struct RoleResolver {
    store: Store,
    create_lock: Mutex<()>,
}

impl RoleResolver {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            create_lock: Mutex::new(()),
        }
    }

    /// Blank role names resolve to None
    pub async fn get_or_create(&self, name: &str) -> Result<Option<DeviceRole>> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(None);
        }

        if let Some(role) = self.store.get_device_role(name).await? {
            return Ok(Some(role));
        }

        let _guard = self.create_lock.lock().await;
        // another task may have created it while we waited
        if let Some(role) = self.store.get_device_role(name).await? {
            return Ok(Some(role));
        }

        let role = self.store.create_device_role(name, role_color).await?;
        tracing::info!("Created device role '{}' with color {}", role.name, role.color);
        Ok(Some(role))
    }
}

/// Color for the role created at position `index` (0-based)
pub fn role_color(index: i64) -> String {
    let hue = (index as f64 * GOLDEN_RATIO).rem_euclid(1.0);

    let q = if LIGHTNESS < 0.5 {
        LIGHTNESS * (1.0 + SATURATION)
    } else {
        LIGHTNESS + SATURATION - LIGHTNESS * SATURATION
    };
    let p = 2.0 * LIGHTNESS - q;

    let r = hue_to_channel(p, q, hue + 1.0 / 3.0);
    let g = hue_to_channel(p, q, hue);
    let b = hue_to_channel(p, q, hue - 1.0 / 3.0);

    format!("#{:02x}{:02x}{:02x}", to_byte(r), to_byte(g), to_byte(b))
}

fn hue_to_channel(p: f64, q: f64, mut t: f64) -> f64 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

// truncates, matching int(x * 255)
fn to_byte(v: f64) -> u8 {
    (v * 255.0).clamp(0.0, 255.0) as u8
}
