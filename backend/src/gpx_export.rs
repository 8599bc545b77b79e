use std::io::Write;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use geo_types::Point;
use gpx::{Gpx, GpxVersion, Track, TrackSegment, Waypoint};

use crate::error::CourseError;
use crate::models::{CourseResult, GeoPoint, TripMode};

const CREATOR: &str = "safe-course";

pub fn encode_course_as_gpx(course: &CourseResult) -> Result<String, CourseError> {
    let mut buffer = Vec::new();
    write_course_gpx(course, &mut buffer)?;
    Ok(BASE64.encode(buffer))
}

/// Write the course as a GPX 1.1 track with the turnaround as a named waypoint.
pub fn write_course_gpx<W: Write>(course: &CourseResult, writer: W) -> Result<(), CourseError> {
    let mut gpx = Gpx {
        version: GpxVersion::Gpx11,
        creator: Some(CREATOR.into()),
        ..Default::default()
    };

    let mut turnaround = to_waypoint(&course.turnaround_point);
    turnaround.name = Some(match course.mode {
        TripMode::OneWay => "Finish".into(),
        TripMode::RoundTrip | TripMode::Preset => "Turnaround".into(),
    });
    gpx.waypoints.push(turnaround);

    let mut track = Track {
        name: Some(track_name(course)),
        ..Default::default()
    };
    let mut segment = TrackSegment::new();
    segment.points.extend(course.route_path.iter().map(to_waypoint));
    track.segments.push(segment);
    gpx.tracks.push(track);

    gpx::write(&gpx, writer)?;
    Ok(())
}

fn track_name(course: &CourseResult) -> String {
    let kind = match course.mode {
        TripMode::RoundTrip => "round trip",
        TripMode::OneWay => "one way",
        TripMode::Preset => "preset",
    };
    match course.actual_distance_m {
        Some(distance_m) => format!("{:.1} km {kind}", distance_m / 1000.0),
        None => kind.to_string(),
    }
}

fn to_waypoint(point: &GeoPoint) -> Waypoint {
    Waypoint::new(Point::new(point.lng, point.lat))
}
