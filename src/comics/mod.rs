//! The comic catalog: one small module per tracked comic, each pairing the
//! comic's metadata with its crawl routine against the live site.

mod ctrlaltdelsillies;
mod devilbear;
mod dilbert;
mod doghouse;
mod hijinksensue;
mod lookingforgroup;
mod playervsplayer;
mod q2qcomics;
mod reveland;
mod xkcd;

use crate::crawler::Crawler;

/// Every known crawler, in catalog order.
pub fn all() -> Vec<Box<dyn Crawler>> {
    vec![
        Box::new(ctrlaltdelsillies::CtrlAltDelSillies),
        Box::new(devilbear::DevilBear),
        Box::new(dilbert::Dilbert),
        Box::new(doghouse::DoghouseDiaries),
        Box::new(hijinksensue::HijinksEnsue),
        Box::new(lookingforgroup::LookingForGroup),
        Box::new(playervsplayer::PlayerVsPlayer),
        Box::new(q2qcomics::Q2qComics),
        Box::new(reveland::Reveland),
        Box::new(xkcd::Xkcd),
    ]
}

pub fn by_slug(slug: &str) -> Option<Box<dyn Crawler>> {
    all().into_iter().find(|crawler| crawler.meta().slug == slug)
}
