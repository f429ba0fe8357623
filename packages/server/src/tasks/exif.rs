//! EXIF extraction, the one operative background task kind.

use exif::{In, Tag, Value};
use sea_orm::sea_query::OnConflict;
use sea_orm::{EntityTrait, Set};
use tracing::{info, warn};

use crate::entity::{image, image_metadata};
use crate::state::AppState;

/// Read the image's object, parse EXIF and upsert the metadata row.
///
/// A missing image row or unreadable object is a retryable failure. An
/// image without parseable EXIF is normal (most PNGs, synthetic images):
/// it yields an empty metadata row and the task succeeds.
pub async fn run_exif_extract(state: &AppState, image_id: i64) -> Result<(), String> {
    let image = image::Entity::find_by_id(image_id)
        .one(&state.db)
        .await
        .map_err(|e| format!("image lookup failed: {e}"))?
        .ok_or_else(|| format!("image {image_id} not found"))?;

    let bytes = state
        .store
        .get_bytes(&image.storage_path)
        .await
        .map_err(|e| format!("object read failed for {}: {e}", image.storage_path))?;

    let mut cursor = std::io::Cursor::new(&bytes);
    let row = match exif::Reader::new().read_from_container(&mut cursor) {
        Ok(parsed) => {
            let row = build_metadata(image_id, &parsed);
            info!(image_id, "EXIF extracted");
            row
        }
        Err(e) => {
            warn!(image_id, error = %e, "no parseable EXIF, storing empty metadata");
            empty_metadata(image_id)
        }
    };

    // Re-running the task replaces the previous extraction.
    image_metadata::Entity::insert(row)
        .on_conflict(
            OnConflict::column(image_metadata::Column::ImageId)
                .update_columns([
                    image_metadata::Column::CameraMake,
                    image_metadata::Column::CameraModel,
                    image_metadata::Column::LensModel,
                    image_metadata::Column::FocalLength,
                    image_metadata::Column::Aperture,
                    image_metadata::Column::ShutterSpeed,
                    image_metadata::Column::Iso,
                    image_metadata::Column::TakenAt,
                    image_metadata::Column::GpsLatitude,
                    image_metadata::Column::GpsLongitude,
                    image_metadata::Column::Orientation,
                    image_metadata::Column::RawExif,
                ])
                .to_owned(),
        )
        .exec_without_returning(&state.db)
        .await
        .map_err(|e| format!("metadata upsert failed: {e}"))?;

    Ok(())
}

fn empty_metadata(image_id: i64) -> image_metadata::ActiveModel {
    image_metadata::ActiveModel {
        image_id: Set(image_id),
        raw_exif: Set(Some("{}".to_string())),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
}

fn build_metadata(image_id: i64, parsed: &exif::Exif) -> image_metadata::ActiveModel {
    let text = |tag: Tag| {
        parsed
            .get_field(tag, In::PRIMARY)
            .map(|f| f.display_value().to_string().trim_matches('"').to_string())
            .filter(|s| !s.is_empty())
    };

    let iso = parsed
        .get_field(Tag::PhotographicSensitivity, In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
        .map(|v| v as i32);

    let orientation = parsed
        .get_field(Tag::Orientation, In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
        .map(|v| v as i32);

    // Full tag map as JSON for everything the typed columns drop.
    let mut raw = serde_json::Map::new();
    for field in parsed.fields() {
        raw.insert(
            format!("{}:{}", field.ifd_num, field.tag),
            serde_json::Value::String(field.display_value().to_string()),
        );
    }

    image_metadata::ActiveModel {
        image_id: Set(image_id),
        camera_make: Set(text(Tag::Make)),
        camera_model: Set(text(Tag::Model)),
        lens_model: Set(text(Tag::LensModel)),
        focal_length: Set(text(Tag::FocalLength)),
        aperture: Set(text(Tag::FNumber)),
        shutter_speed: Set(text(Tag::ExposureTime)),
        iso: Set(iso),
        taken_at: Set(text(Tag::DateTimeOriginal)),
        gps_latitude: Set(gps_coordinate(
            parsed,
            Tag::GPSLatitude,
            Tag::GPSLatitudeRef,
        )),
        gps_longitude: Set(gps_coordinate(
            parsed,
            Tag::GPSLongitude,
            Tag::GPSLongitudeRef,
        )),
        orientation: Set(orientation),
        raw_exif: Set(Some(
            serde_json::Value::Object(raw).to_string(),
        )),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
}

/// Convert a degrees/minutes/seconds GPS rational triple into a signed
/// decimal coordinate.
fn gps_coordinate(parsed: &exif::Exif, value_tag: Tag, ref_tag: Tag) -> Option<f64> {
    let field = parsed.get_field(value_tag, In::PRIMARY)?;
    let Value::Rational(parts) = &field.value else {
        return None;
    };

    let decimal = match parts.len() {
        0 => return None,
        1 | 2 => parts[0].to_f64(),
        _ => parts[0].to_f64() + parts[1].to_f64() / 60.0 + parts[2].to_f64() / 3600.0,
    };

    let reference = parsed
        .get_field(ref_tag, In::PRIMARY)
        .map(|f| f.display_value().to_string())
        .unwrap_or_default();
    let sign = if reference.contains('S') || reference.contains('W') {
        -1.0
    } else {
        1.0
    };

    Some(sign * decimal)
}
