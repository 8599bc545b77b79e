pub use shared::{
    ApiError, CourseBounds, CourseMetadata, CourseRequest, CourseResponse, CourseResult, GeoPoint,
    LoopWaypointsRequest, PresetCourse, PresetCourseRequest, RouteResult, SafeCategory, SafePoint,
    TripMode, TurnaroundRequest,
};
