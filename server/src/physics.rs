use shared::{
    Direction, Point, Side, BALL_RADIUS, BASE_SPEED, CANVAS_HEIGHT, CANVAS_WIDTH, PADDLE_HEIGHT,
    PADDLE_MARGIN, PADDLE_WIDTH,
};

/// Largest deflection from horizontal after a paddle hit, reached at the paddle tips.
pub const MAX_BOUNCE_ANGLE: f32 = std::f32::consts::FRAC_PI_4;
/// Serve direction, measured from horizontal.
pub const SERVE_ANGLE: f32 = std::f32::consts::FRAC_PI_6;
/// Speed multiplier applied on every paddle hit, capped by the max speed.
pub const PADDLE_SPEEDUP: f32 = 1.05;

// Walls are hit by the ball's edge. Goals are asymmetric: the left goal needs
// the centre past x = 0, the right goal only the leading edge past the width.

///Represents one side's paddle. Position is the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Paddle {
    pub side: Side,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    ///Vertical velocity in pixels per second. Positive direction is down.
    pub velocity: f32,
    pub speed_modifier: f32,
}

impl Paddle {
    pub fn new(side: Side) -> Self {
        let x = match side {
            Side::Left => PADDLE_MARGIN,
            Side::Right => CANVAS_WIDTH - PADDLE_MARGIN - PADDLE_WIDTH,
        };
        Paddle {
            side,
            x,
            y: (CANVAS_HEIGHT - PADDLE_HEIGHT) / 2.0,
            width: PADDLE_WIDTH,
            height: PADDLE_HEIGHT,
            velocity: 0.0,
            speed_modifier: 1.0,
        }
    }

    ///Restores the start position, height and speed modifier.
    pub fn reset(&mut self) {
        *self = Paddle::new(self.side);
    }

    pub fn steer(&mut self, direction: Direction) {
        self.velocity = match direction {
            Direction::Up => -BASE_SPEED * self.speed_modifier,
            Direction::Down => BASE_SPEED * self.speed_modifier,
            Direction::Stop => 0.0,
        };
    }

    pub fn integrate(&mut self, dt: f32) {
        self.y += self.velocity * dt;
        self.clamp();
    }

    ///Keeps the paddle fully inside the canvas.
    pub fn clamp(&mut self) {
        self.y = self.y.clamp(0.0, CANVAS_HEIGHT - self.height);
    }

    ///Changes the height around the current centre, then clamps.
    pub fn resize(&mut self, height: f32) {
        let centre = self.y + self.height / 2.0;
        self.height = height;
        self.y = centre - height / 2.0;
        self.clamp();
    }

    pub fn centre_y(&self) -> f32 {
        self.y + self.height / 2.0
    }

    ///X coordinate of the face the ball bounces off.
    pub fn face_x(&self) -> f32 {
        match self.side {
            Side::Left => self.x + self.width,
            Side::Right => self.x,
        }
    }
}

///Represents a ball. Position is the centre.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ball {
    pub x: f32,
    pub y: f32,
    pub prev_x: f32,
    pub prev_y: f32,
    pub radius: f32,
    pub speed_x: f32,
    pub speed_y: f32,
}

impl Default for Ball {
    fn default() -> Self {
        Ball::centred()
    }
}

impl Ball {
    ///A ball at rest in the middle of the canvas.
    pub fn centred() -> Self {
        let x = CANVAS_WIDTH / 2.0;
        let y = CANVAS_HEIGHT / 2.0;
        Ball {
            x,
            y,
            prev_x: x,
            prev_y: y,
            radius: BALL_RADIUS,
            speed_x: 0.0,
            speed_y: 0.0,
        }
    }

    pub fn reset(&mut self) {
        *self = Ball::centred();
    }

    ///Arms the ball with the serve velocity toward `toward`.
    ///`vertical_sign` picks whether the serve heads down (positive) or up.
    pub fn serve(&mut self, toward: Side, vertical_sign: f32) {
        let horizontal = match toward {
            Side::Left => -1.0,
            Side::Right => 1.0,
        };
        self.speed_x = horizontal * BASE_SPEED * SERVE_ANGLE.cos();
        self.speed_y = vertical_sign.signum() * BASE_SPEED * SERVE_ANGLE.sin();
    }

    pub fn integrate(&mut self, dt: f32) {
        self.prev_x = self.x;
        self.prev_y = self.y;
        self.x += self.speed_x * dt;
        self.y += self.speed_y * dt;
    }

    pub fn speed(&self) -> f32 {
        (self.speed_x * self.speed_x + self.speed_y * self.speed_y).sqrt()
    }

    pub fn is_moving(&self) -> bool {
        self.speed_x != 0.0 || self.speed_y != 0.0
    }

    ///Rescales the velocity to `speed`, keeping its direction.
    pub fn set_speed(&mut self, speed: f32) {
        let current = self.speed();
        if current == 0.0 {
            return;
        }
        let scale = speed / current;
        self.speed_x *= scale;
        self.speed_y *= scale;
    }

    pub fn position(&self) -> Point {
        Point {
            x: self.x,
            y: self.y,
        }
    }
}

///Reflects the ball off the top and bottom walls.
///Returns true if a bounce happened.
pub fn bounce_off_walls(ball: &mut Ball) -> bool {
    if ball.y - ball.radius <= 0.0 {
        ball.y = ball.radius;
        ball.speed_y = ball.speed_y.abs();
        true
    } else if ball.y + ball.radius >= CANVAS_HEIGHT {
        ball.y = CANVAS_HEIGHT - ball.radius;
        ball.speed_y = -ball.speed_y.abs();
        true
    } else {
        false
    }
}

///Reflects the ball off the left and right walls. Only decoys use this; the real
///ball scores instead.
pub fn bounce_off_side_walls(ball: &mut Ball) {
    if ball.x - ball.radius <= 0.0 {
        ball.x = ball.radius;
        ball.speed_x = ball.speed_x.abs();
    } else if ball.x + ball.radius >= CANVAS_WIDTH {
        ball.x = CANVAS_WIDTH - ball.radius;
        ball.speed_x = -ball.speed_x.abs();
    }
}

///Checks if the ball's bounding square overlaps the paddle rectangle.
pub fn overlaps(ball: &Ball, paddle: &Paddle) -> bool {
    let ball_left = ball.x - ball.radius;
    let ball_right = ball.x + ball.radius;
    let ball_top = ball.y - ball.radius;
    let ball_bottom = ball.y + ball.radius;

    !(ball_right < paddle.x
        || ball_left > paddle.x + paddle.width
        || ball_bottom < paddle.y
        || ball_top > paddle.y + paddle.height)
}

///Finds where the ball touches the paddle this tick, if it does.
///
///Combines a plain overlap test at the current position with a swept test along
///the previous-to-current segment, so a fast ball cannot tunnel through the
///paddle face in a single tick. Returns the contact y coordinate.
pub fn paddle_contact(ball: &Ball, paddle: &Paddle) -> Option<f32> {
    let approaching = match paddle.side {
        Side::Left => ball.speed_x < 0.0,
        Side::Right => ball.speed_x > 0.0,
    };
    if !approaching {
        return None;
    }

    let face = paddle.face_x();
    // Leading edge of the ball before and after the move
    let (prev_edge, edge) = match paddle.side {
        Side::Left => (ball.prev_x - ball.radius, ball.x - ball.radius),
        Side::Right => (ball.prev_x + ball.radius, ball.x + ball.radius),
    };
    let crossed = match paddle.side {
        Side::Left => prev_edge >= face && edge < face,
        Side::Right => prev_edge <= face && edge > face,
    };

    if crossed {
        let t = (prev_edge - face) / (prev_edge - edge);
        let contact_y = ball.prev_y + t * (ball.y - ball.prev_y);
        if contact_y + ball.radius >= paddle.y && contact_y - ball.radius <= paddle.y + paddle.height
        {
            return Some(contact_y);
        }
    }

    // A centre already behind the paddle's middle is heading for the goal
    let in_front = match paddle.side {
        Side::Left => ball.x >= paddle.x + paddle.width / 2.0,
        Side::Right => ball.x <= paddle.x + paddle.width / 2.0,
    };
    if in_front && overlaps(ball, paddle) {
        return Some(ball.y);
    }

    None
}

///Bounces the ball off the paddle if they touch.
///
///The outgoing angle depends on the contact offset from the paddle centre
///(`MAX_BOUNCE_ANGLE` at the tips, flat in the middle). The ball speeds up by
///`PADDLE_SPEEDUP` per hit, never beyond `max_speed`.
pub fn bounce_off_paddle(ball: &mut Ball, paddle: &Paddle, max_speed: f32) -> bool {
    let contact_y = match paddle_contact(ball, paddle) {
        Some(y) => y,
        None => return false,
    };

    let half_height = paddle.height / 2.0;
    let relative = ((contact_y - paddle.centre_y()) / half_height).clamp(-1.0, 1.0);
    let angle = relative * MAX_BOUNCE_ANGLE;
    let speed = (ball.speed() * PADDLE_SPEEDUP).min(max_speed);

    let (away, x) = match paddle.side {
        Side::Left => (1.0, paddle.face_x() + ball.radius),
        Side::Right => (-1.0, paddle.face_x() - ball.radius),
    };

    ball.speed_x = away * speed * angle.cos();
    ball.speed_y = speed * angle.sin();
    ball.x = x;
    ball.y = contact_y;
    true
}

///Returns the side that scores if the ball has left the court.
pub fn scoring_side(ball: &Ball) -> Option<Side> {
    if ball.x < 0.0 {
        Some(Side::Right)
    } else if ball.x + ball.radius > CANVAS_WIDTH {
        Some(Side::Left)
    } else {
        None
    }
}
