use super::geo_search::GeoSearch;
use super::stations::Station;
use super::stations::StationRegistry;
use super::stations::TripMode;

/// Distinguishes genuine subway stations from synthetic ones inserted after
/// loading (e.g. border sample points with no station in any radius), and
/// finds the genuine station a transit leg must detour through.
pub struct VirtualStationResolver<'a> {
    registry: &'a StationRegistry,
    search: &'a GeoSearch,
}

impl<'a> VirtualStationResolver<'a> {
    pub fn new(registry: &'a StationRegistry, search: &'a GeoSearch)
               -> VirtualStationResolver<'a> {
        VirtualStationResolver{registry, search}
    }

    /// A station is virtual when its name is not among the originally loaded
    /// subway station names.
    pub fn is_virtual(&self, station: &Station) -> bool {
        ! self.registry.is_original_subway(&station.name)
    }

    /// The nearest genuine subway station to a virtual station, excluding the
    /// virtual station itself (the bounded search would return it first, at
    /// distance zero).  Falls back to an unbounded scan when nothing genuine
    /// is in radius; None only if the network has no genuine stations at all.
    pub fn nearest_real(&self, virtual_station: &Station, radius_km: f64)
                        -> Option<(Station, f64)> {
        let candidates = self.search.
            within_radius(&virtual_station.position, radius_km, TripMode::Subway);
        let found = candidates.into_iter().
            find(|(station, _)| ! self.is_virtual(station) &&
                                station.name != virtual_station.name);
        if found.is_some() {
            return found;
        }

        log::info!("No real subway station within {} km of virtual station {}; \
                    scanning the whole network", radius_km, virtual_station.name);
        let mut best: Option<(Station, f64)> = None;
        for station in self.registry.subway_stations() {
            if self.is_virtual(station) || station.name == virtual_station.name {
                continue;
            }
            let dist = virtual_station.position.haversine_distance(&station.position);
            match &best {
                Some((_, best_dist)) if *best_dist <= dist => (),
                _ => best = Some((station.clone(), dist)),
            }
        }

        best
    }
}
