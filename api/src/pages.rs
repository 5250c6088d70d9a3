use std::collections::{HashMap, VecDeque};

use crate::categories::{CategoryError, CategoryResolver};
use crate::models::{Categories, Game};

/// Walks a ranked game list, resolving categories one batch at a time and
/// yielding only the games whose categories pass `predicate`.
///
/// A batch covers `page_size` consecutive candidates and the next one is
/// only resolved once the current one is drained, so a consumer that stops
/// early never pays for categories it did not look at. Single pass: build a
/// new sequence to start over.
pub struct GamePages<'a, P> {
    resolver: &'a CategoryResolver,
    games: &'a [Game],
    page_size: usize,
    predicate: P,
    skip: usize,
    next_candidate: usize,
    batch: VecDeque<(Game, Categories)>,
    done: bool,
}

impl<'a, P> GamePages<'a, P>
where
    P: Fn(&[u16]) -> bool,
{
    pub fn new(resolver: &'a CategoryResolver, games: &'a [Game], page_size: usize, predicate: P) -> Self {
        assert!(page_size > 0, "page size must be positive");

        Self {
            resolver,
            games,
            page_size,
            predicate,
            skip: 0,
            next_candidate: 0,
            batch: VecDeque::with_capacity(page_size.min(games.len())),
            done: false,
        }
    }

    /// Accepted games before `offset` are consumed without being yielded.
    pub fn skip(mut self, offset: usize) -> Self {
        self.skip = offset;
        self
    }

    /// Yields the next accepted game. After an error the sequence is finished.
    pub async fn next(&mut self) -> Option<Result<(Game, Categories), CategoryError>> {
        loop {
            while let Some((game, categories)) = self.batch.pop_front() {
                if !(self.predicate)(categories.as_slice()) {
                    continue;
                }
                if self.skip > 0 {
                    self.skip -= 1;
                    continue;
                }
                return Some(Ok((game, categories)));
            }

            if self.done || self.next_candidate >= self.games.len() {
                self.done = true;
                return None;
            }

            if let Err(err) = self.load_batch().await {
                self.done = true;
                return Some(Err(err));
            }
        }
    }

    /// Collects up to `page_size` accepted games, fewer once the candidates run out.
    pub async fn next_page(&mut self) -> Result<Vec<Game>, CategoryError> {
        let mut page = Vec::with_capacity(self.page_size.min(self.games.len()));
        while page.len() < self.page_size {
            match self.next().await {
                Some(Ok((game, _))) => page.push(game),
                Some(Err(err)) => return Err(err),
                None => break,
            }
        }
        Ok(page)
    }

    async fn load_batch(&mut self) -> Result<(), CategoryError> {
        let end = self
            .next_candidate
            .saturating_add(self.page_size)
            .min(self.games.len());
        let candidates = &self.games[self.next_candidate..end];
        let app_ids: Vec<_> = candidates.iter().map(|g| g.app_id).collect();

        let mut categories = HashMap::with_capacity(app_ids.len());
        self.resolver.resolve_into(&app_ids, &mut categories).await?;

        self.next_candidate = end;
        for game in candidates {
            if let Some(game_categories) = categories.remove(&game.app_id) {
                self.batch.push_back((game.clone(), game_categories));
            }
        }

        Ok(())
    }
}
