use std::{
    fs::File,
    io::{self, Read},
    path::Path,
    sync::Arc,
};

use once_cell::sync::Lazy;

use crate::{
    geo::{EmptyInputError, nearest},
    models::{GeoPoint, SafeCategory, SafePoint},
};

#[derive(Debug, thiserror::Error)]
pub enum CatalogueError {
    #[error("failed to read safe-point catalogue: {0}")]
    Io(#[from] io::Error),
    #[error("invalid safe-point catalogue: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Read-only catalogue of river landmarks, stream segments and parks.
///
/// River landmarks are kept in their own slice so riverside proximity can be
/// weighted separately; every query over the whole catalogue scans the merged
/// set.
#[derive(Debug, Clone)]
pub struct SafePointIndex {
    river: Vec<SafePoint>,
    all: Vec<SafePoint>,
}

static BUILTIN: Lazy<Arc<SafePointIndex>> = Lazy::new(|| {
    let index = SafePointIndex::from_categories(river_landmarks(), stream_segments(), city_parks());
    tracing::debug!("built-in safe-point catalogue: {} entries", index.len());
    Arc::new(index)
});

impl SafePointIndex {
    pub fn builtin() -> Arc<SafePointIndex> {
        Arc::clone(&BUILTIN)
    }

    pub fn from_categories(
        river: Vec<SafePoint>,
        streams: Vec<SafePoint>,
        parks: Vec<SafePoint>,
    ) -> Self {
        let mut all = Vec::with_capacity(river.len() + streams.len() + parks.len());
        all.extend(river.iter().cloned());
        all.extend(streams);
        all.extend(parks);
        Self { river, all }
    }

    /// Flat catalogue; bridges count as river landmarks.
    pub fn new(points: Vec<SafePoint>) -> Self {
        let river = points
            .iter()
            .filter(|p| p.category == SafeCategory::Bridge)
            .cloned()
            .collect();
        Self { river, all: points }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CatalogueError> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader(reader: impl Read) -> Result<Self, CatalogueError> {
        let points: Vec<SafePoint> = serde_json::from_reader(reader)?;
        Ok(Self::new(points))
    }

    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    pub fn points(&self) -> &[SafePoint] {
        &self.all
    }

    pub fn nearest_safe_point(&self, lat: f64, lng: f64) -> Result<f64, EmptyInputError> {
        nearest(GeoPoint::new(lat, lng), &self.all).map(|(_, km)| km)
    }

    pub fn nearest_river_point(&self, lat: f64, lng: f64) -> Result<f64, EmptyInputError> {
        nearest(GeoPoint::new(lat, lng), &self.river).map(|(_, km)| km)
    }

    pub fn is_near(&self, lat: f64, lng: f64, threshold_km: f64) -> Result<bool, EmptyInputError> {
        Ok(self.nearest_safe_point(lat, lng)? <= threshold_km)
    }
}

fn river_landmarks() -> Vec<SafePoint> {
    use SafeCategory::{Bridge, Park};
    vec![
        SafePoint::new("Gangseo Hangang Park", 37.5876, 126.8172, Park),
        SafePoint::new("Nanji Hangang Park", 37.5665, 126.8755, Park),
        SafePoint::new("Mangwon Hangang Park", 37.5550, 126.8950, Park),
        SafePoint::new("Seonyudo Park", 37.5432, 126.8995, Park),
        SafePoint::new("Yanghwa Hangang Park", 37.5383, 126.9020, Park),
        SafePoint::new("Yeouido Hangang Park", 37.5284, 126.9327, Park),
        SafePoint::new("Ichon Hangang Park", 37.5172, 126.9707, Park),
        SafePoint::new("Banpo Hangang Park", 37.5101, 126.9960, Park),
        SafePoint::new("Jamwon Hangang Park", 37.5261, 127.0137, Park),
        SafePoint::new("Ttukseom Hangang Park", 37.5296, 127.0701, Park),
        SafePoint::new("Jamsil Hangang Park", 37.5176, 127.0822, Park),
        SafePoint::new("Gwangnaru Hangang Park", 37.5501, 127.1213, Park),
        SafePoint::new("Mapo Bridge", 37.5358, 126.9375, Bridge),
        SafePoint::new("Hangang Bridge", 37.5173, 126.9587, Bridge),
        SafePoint::new("Banpo Bridge", 37.5147, 126.9966, Bridge),
        SafePoint::new("Seongsu Bridge", 37.5370, 127.0348, Bridge),
        SafePoint::new("Jamsil Bridge", 37.5250, 127.0935, Bridge),
    ]
}

fn stream_segments() -> Vec<SafePoint> {
    use SafeCategory::Stream;
    vec![
        SafePoint::new("Cheonggyecheon (Cheonggye Plaza)", 37.5700, 126.9780, Stream),
        SafePoint::new("Cheonggyecheon (Gwanggyo)", 37.5690, 126.9920, Stream),
        SafePoint::new("Cheonggyecheon (Dongdaemun)", 37.5710, 127.0160, Stream),
        SafePoint::new("Cheonggyecheon (Majang)", 37.5660, 127.0400, Stream),
        SafePoint::new("Jungnangcheon (Seongdong)", 37.5500, 127.0600, Stream),
        SafePoint::new("Jungnangcheon (Jangan)", 37.5800, 127.0700, Stream),
        SafePoint::new("Jungnangcheon (Mukdong)", 37.6100, 127.0750, Stream),
        SafePoint::new("Anyangcheon (Yangpyeong)", 37.5300, 126.8800, Stream),
        SafePoint::new("Anyangcheon (Mokdong)", 37.5000, 126.8800, Stream),
        SafePoint::new("Anyangcheon (Guro)", 37.4800, 126.8900, Stream),
        SafePoint::new("Tancheon (Daechi)", 37.5100, 127.0700, Stream),
        SafePoint::new("Tancheon (Suseo)", 37.4900, 127.0900, Stream),
        SafePoint::new("Yangjaecheon (Yangjae)", 37.4800, 127.0400, Stream),
        SafePoint::new("Yangjaecheon (Gaepo)", 37.4870, 127.0600, Stream),
        SafePoint::new("Hongjecheon (Hongeun)", 37.5800, 126.9300, Stream),
        SafePoint::new("Hongjecheon (Yeonnam)", 37.5650, 126.9100, Stream),
        SafePoint::new("Bulgwangcheon", 37.6000, 126.9200, Stream),
    ]
}

fn city_parks() -> Vec<SafePoint> {
    use SafeCategory::Park;
    vec![
        SafePoint::new("Seoul Forest", 37.5444, 127.0374, Park),
        SafePoint::new("Olympic Park", 37.5202, 127.1214, Park),
        SafePoint::new("Namsan Park", 37.5509, 126.9908, Park),
        SafePoint::new("Boramae Park", 37.4925, 126.9196, Park),
        SafePoint::new("Children's Grand Park", 37.5480, 127.0740, Park),
        SafePoint::new("World Cup Park", 37.5650, 126.8900, Park),
        SafePoint::new("Yongsan Family Park", 37.5240, 126.9830, Park),
        SafePoint::new("Dream Forest", 37.6200, 127.0410, Park),
        SafePoint::new("Seoul Grand Park", 37.4370, 127.0050, Park),
        SafePoint::new("Gyeongui Line Forest Park", 37.5580, 126.9250, Park),
        SafePoint::new("Haneul Park", 37.5680, 126.8850, Park),
    ]
}
